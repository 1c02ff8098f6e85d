use crate::App;
use crate::commands::sessions::{print_last_exchange, print_latest_images};
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::Path;
use weav_application::orchestrator::{
    RegenerateChatOptions, RegenerateImageOptions, SendImageOverrides,
};
use weav_core::generation::GenerationApi;
use weav_core::models::{ImageOptionPatch, validate_chat_prompt, validate_image_prompt};

/// Image option flags shared by `image` and `regenerate image`.
#[derive(Debug, Default)]
pub struct ImageArgs {
    pub aspect_ratio: Option<String>,
    pub count: Option<u32>,
    pub resolution: Option<String>,
    pub format: Option<String>,
    pub seed: Option<i64>,
    pub reference_id: Option<i64>,
    pub reference_url: Option<String>,
}

impl ImageArgs {
    fn patch(&self) -> ImageOptionPatch {
        ImageOptionPatch {
            aspect_ratio: self.aspect_ratio.clone(),
            num_images: self.count,
            resolution: self.resolution.clone(),
            output_format: self.format.clone(),
            seed: self.seed,
        }
    }
}

/// Surfaces the orchestrator outcome: either the refreshed session content
/// or the recorded error.
fn finish(app: &App, on_success: impl FnOnce(&App)) -> Result<()> {
    if let Some(error) = app.orchestrator.last_error() {
        bail!("{error}");
    }
    on_success(app);
    Ok(())
}

pub async fn chat(app: &App, session_id: i64, prompt: &str, model: Option<String>) -> Result<()> {
    if let Some(model) = model {
        app.preferences.set_chat_model(session_id, model);
    }
    let model = app.preferences.chat_model(session_id);
    validate_chat_prompt(prompt, &model)?;

    app.directory.select(Some(session_id)).await?;
    eprintln!("{}", format!("sending to {model}...").dimmed());
    app.orchestrator.send_chat(prompt, &model).await;

    finish(app, |app| {
        if let Some(session) = app.directory.current() {
            print_last_exchange(&session);
        }
    })
}

pub async fn image(
    app: &App,
    session_id: i64,
    prompt: &str,
    model: Option<String>,
    args: ImageArgs,
) -> Result<()> {
    if let Some(model) = model {
        app.preferences.set_image_model(session_id, model);
    }
    let model = app.preferences.image_model(session_id);
    validate_image_prompt(prompt, &model)?;

    app.directory.select(Some(session_id)).await?;
    eprintln!("{}", format!("generating with {model}...").dimmed());
    let overrides = SendImageOverrides {
        reference_image_id: args.reference_id,
        reference_image_url: args.reference_url.clone(),
        options: args.patch(),
    };
    app.orchestrator.send_image(prompt, &model, &overrides).await;

    let count = args.count.unwrap_or(1) as usize;
    finish(app, |app| {
        if let Some(session) = app.directory.current() {
            print_latest_images(&session, count);
        }
    })
}

pub async fn regenerate_chat(
    app: &App,
    session_id: i64,
    prompt: Option<String>,
    model: Option<String>,
) -> Result<()> {
    app.directory.select(Some(session_id)).await?;
    eprintln!("{}", "regenerating...".dimmed());
    app.orchestrator
        .regenerate_chat(session_id, &RegenerateChatOptions { model, prompt })
        .await;

    finish(app, |app| {
        if let Some(session) = app.directory.current() {
            print_last_exchange(&session);
        }
    })
}

pub async fn regenerate_image(
    app: &App,
    session_id: i64,
    prompt: Option<String>,
    args: ImageArgs,
) -> Result<()> {
    app.directory.select(Some(session_id)).await?;
    eprintln!("{}", "regenerating...".dimmed());
    app.orchestrator
        .regenerate_image(
            session_id,
            &RegenerateImageOptions {
                prompt,
                options: args.patch(),
            },
        )
        .await;

    finish(app, |app| {
        if let Some(session) = app.directory.current() {
            print_latest_images(&session, 1);
        }
    })
}

pub async fn upload_reference(app: &App, file: &Path) -> Result<()> {
    let bytes = std::fs::read(file)?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "reference.png".to_string());

    let url = app.api.upload_reference_image(&file_name, bytes).await?;
    println!("{}", url.underline());
    Ok(())
}
