//! Static model catalog.
//!
//! The set of chat and image models the backend routes to, with the
//! per-model image generation settings the option pickers are built from.
//! The catalog is compiled in; the backend validates again on its side.

use crate::error::{Result, WeavError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_CHAT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "fal-ai/imagen4/preview";

/// A chat completion model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatModel {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
}

/// An image generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageModel {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
}

pub const CHAT_MODELS: &[ChatModel] = &[
    ChatModel {
        id: "google/gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        provider: "Google",
    },
    ChatModel {
        id: "google/gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        provider: "Google",
    },
    ChatModel {
        id: "openai/gpt-4o",
        name: "GPT-4o",
        provider: "OpenAI",
    },
    ChatModel {
        id: "openai/gpt-4o-mini",
        name: "GPT-4o Mini",
        provider: "OpenAI",
    },
    ChatModel {
        id: "openai/gpt-5-chat",
        name: "GPT-5 Chat",
        provider: "OpenAI",
    },
];

pub const IMAGE_MODELS: &[ImageModel] = &[
    ImageModel {
        id: "fal-ai/imagen4/preview",
        name: "Imagen 4 (Google)",
        provider: "Google",
    },
    ImageModel {
        id: "fal-ai/flux-pro/v1.1-ultra",
        name: "FLUX Pro v1.1 Ultra",
        provider: "fal.ai",
    },
    ImageModel {
        id: "fal-ai/gemini-3-pro-image-preview",
        name: "Gemini 3 Pro Image Preview",
        provider: "Google",
    },
    ImageModel {
        id: "kling-ai/kling-v1",
        name: "Kling",
        provider: "Kling",
    },
];

/// Capability set of one image model.
#[derive(Debug, Clone, Copy)]
pub struct ImageModelSettings {
    pub aspect_ratios: &'static [&'static str],
    /// Empty when the model has no resolution knob
    pub resolutions: &'static [&'static str],
    /// Empty when the model has no output-format knob
    pub output_formats: &'static [&'static str],
    pub num_images_max: u32,
    pub supports_seed: bool,
    /// Whether the model accepts a reference image (uploaded or picked
    /// from prior records in the session)
    pub supports_reference: bool,
}

static IMAGE_MODEL_SETTINGS: Lazy<HashMap<&'static str, ImageModelSettings>> = Lazy::new(|| {
    HashMap::from([
        (
            "fal-ai/imagen4/preview",
            ImageModelSettings {
                aspect_ratios: &["1:1", "16:9", "9:16", "4:3", "3:4"],
                resolutions: &["1K", "2K"],
                output_formats: &["png", "jpeg", "webp"],
                num_images_max: 4,
                supports_seed: false,
                supports_reference: false,
            },
        ),
        (
            "fal-ai/flux-pro/v1.1-ultra",
            ImageModelSettings {
                aspect_ratios: &["21:9", "16:9", "4:3", "3:2", "1:1", "2:3", "3:4", "9:16", "9:21"],
                resolutions: &[],
                output_formats: &["jpeg", "png"],
                num_images_max: 4,
                supports_seed: false,
                supports_reference: false,
            },
        ),
        (
            "fal-ai/gemini-3-pro-image-preview",
            ImageModelSettings {
                aspect_ratios: &[
                    "21:9", "16:9", "3:2", "4:3", "5:4", "1:1", "4:5", "3:4", "2:3", "9:16",
                ],
                resolutions: &["1K", "2K", "4K"],
                output_formats: &["png", "jpeg", "webp"],
                num_images_max: 4,
                supports_seed: true,
                supports_reference: true,
            },
        ),
        (
            "kling-ai/kling-v1",
            ImageModelSettings {
                aspect_ratios: &["1:1", "16:9", "9:16", "4:3", "3:4", "3:2", "2:3"],
                resolutions: &[],
                output_formats: &[],
                num_images_max: 4,
                supports_seed: true,
                supports_reference: true,
            },
        ),
    ])
});

/// Looks up the settings for an image model, if it is in the catalog.
pub fn image_model_settings(model_id: &str) -> Option<&'static ImageModelSettings> {
    IMAGE_MODEL_SETTINGS.get(model_id)
}

/// Whether the model accepts a reference image.
pub fn image_model_supports_reference(model_id: &str) -> bool {
    image_model_settings(model_id).is_some_and(|s| s.supports_reference)
}

/// Options sent with an image generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenOptions {
    pub aspect_ratio: String,
    pub num_images: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl ImageGenOptions {
    /// Applies a partial update, field by field; patched fields win.
    pub fn apply(&mut self, patch: &ImageOptionPatch) {
        if let Some(aspect_ratio) = &patch.aspect_ratio {
            self.aspect_ratio = aspect_ratio.clone();
        }
        if let Some(num_images) = patch.num_images {
            self.num_images = num_images;
        }
        if let Some(resolution) = &patch.resolution {
            self.resolution = Some(resolution.clone());
        }
        if let Some(output_format) = &patch.output_format {
            self.output_format = Some(output_format.clone());
        }
        if let Some(seed) = patch.seed {
            self.seed = Some(seed);
        }
    }
}

/// A partial update of [`ImageGenOptions`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageOptionPatch {
    pub aspect_ratio: Option<String>,
    pub num_images: Option<u32>,
    pub resolution: Option<String>,
    pub output_format: Option<String>,
    pub seed: Option<i64>,
}

impl ImageOptionPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Folds another patch into this one; fields set in `other` win.
    pub fn merge(&mut self, other: &ImageOptionPatch) {
        if other.aspect_ratio.is_some() {
            self.aspect_ratio = other.aspect_ratio.clone();
        }
        if other.num_images.is_some() {
            self.num_images = other.num_images;
        }
        if other.resolution.is_some() {
            self.resolution = other.resolution.clone();
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format.clone();
        }
        if other.seed.is_some() {
            self.seed = other.seed;
        }
    }
}

/// Model-specific default options: the head of each settings list, one image.
///
/// Unknown models fall back to square/1K/png.
pub fn default_image_options(model_id: &str) -> ImageGenOptions {
    let settings = image_model_settings(model_id);
    ImageGenOptions {
        aspect_ratio: settings
            .and_then(|s| s.aspect_ratios.first())
            .unwrap_or(&"1:1")
            .to_string(),
        num_images: 1,
        resolution: Some(
            settings
                .and_then(|s| s.resolutions.first())
                .unwrap_or(&"1K")
                .to_string(),
        ),
        output_format: Some(
            settings
                .and_then(|s| s.output_formats.first())
                .unwrap_or(&"png")
                .to_string(),
        ),
        seed: None,
    }
}

/// Chat prompts: at most 320k characters unless the model allows more.
pub const CHAT_PROMPT_MAX_LENGTH: usize = 320_000;
/// Image prompts: at most 10k characters.
pub const IMAGE_PROMPT_MAX_LENGTH: usize = 10_000;

fn chat_prompt_max_length(model_id: &str) -> usize {
    match model_id {
        "google/gemini-2.5-flash" | "google/gemini-2.5-pro" => 1_000_000,
        "openai/gpt-4o" | "openai/gpt-4o-mini" | "openai/gpt-5-chat" => 128_000,
        _ => CHAT_PROMPT_MAX_LENGTH,
    }
}

fn validate_prompt(text: &str, max_len: usize) -> Result<()> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WeavError::validation("prompt must not be empty"));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(WeavError::validation(format!(
            "prompt exceeds the {max_len} character limit (got {len})"
        )));
    }
    Ok(())
}

/// Validates a chat prompt against the per-model length limit.
pub fn validate_chat_prompt(text: &str, model_id: &str) -> Result<()> {
    validate_prompt(text, chat_prompt_max_length(model_id))
}

/// Validates an image prompt.
pub fn validate_image_prompt(text: &str, _model_id: &str) -> Result<()> {
    validate_prompt(text, IMAGE_PROMPT_MAX_LENGTH)
}
