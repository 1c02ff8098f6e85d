use colored::Colorize;
use weav_core::models::{CHAT_MODELS, IMAGE_MODELS, image_model_settings};

pub fn list() {
    println!("{}", "chat models".bold());
    for model in CHAT_MODELS {
        println!("  {:<36} {} ({})", model.id.bright_cyan(), model.name, model.provider);
    }

    println!("{}", "image models".bold());
    for model in IMAGE_MODELS {
        println!("  {:<36} {} ({})", model.id.bright_cyan(), model.name, model.provider);
        if let Some(settings) = image_model_settings(model.id) {
            let mut notes = vec![format!("aspect {}", settings.aspect_ratios.join("/"))];
            if !settings.resolutions.is_empty() {
                notes.push(format!("res {}", settings.resolutions.join("/")));
            }
            if !settings.output_formats.is_empty() {
                notes.push(format!("fmt {}", settings.output_formats.join("/")));
            }
            if settings.supports_seed {
                notes.push("seed".to_string());
            }
            if settings.supports_reference {
                notes.push("reference".to_string());
            }
            println!("    {}", notes.join(", ").dimmed());
        }
    }
}
