//! Per-session preference model and the durable storage seam.
//!
//! Only the per-session model pair survives restarts; everything else the
//! preference store tracks (image option overrides, reference selection)
//! lives for the process lifetime.

use crate::error::Result;
use crate::models::{DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The model pair remembered for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionModels {
    pub chat_model: String,
    pub image_model: String,
}

impl Default for SessionModels {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }
}

/// The durable preference payload: session id → model pair.
pub type PreferenceMap = HashMap<i64, SessionModels>;

/// Durable storage for the serialized preference map.
///
/// Implementations move an opaque string payload to and from durable
/// storage; parsing stays in the preference store so a corrupt payload can
/// fall back to defaults instead of failing the caller. The production
/// implementation lives in `weav-infrastructure`; tests use in-memory
/// fakes.
pub trait PreferenceStorage: Send + Sync {
    /// Loads the stored payload.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<String>>;

    /// Replaces the stored payload.
    fn save(&self, payload: &str) -> Result<()>;
}
