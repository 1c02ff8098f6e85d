//! Per-session generation preferences.
//!
//! The store keeps the chosen chat/image model per session (durable), plus
//! image option overrides and the reference-image selection (process
//! lifetime only). Every model mutation synchronously rewrites the full map
//! through the injected [`PreferenceStorage`]; a corrupt stored payload is
//! treated as empty rather than an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use weav_core::models::{ImageGenOptions, ImageOptionPatch, default_image_options};
use weav_core::preferences::{PreferenceMap, PreferenceStorage, SessionModels};

struct PreferenceState {
    models: PreferenceMap,
    image_overrides: HashMap<i64, ImageOptionPatch>,
    reference_image_ids: HashMap<i64, i64>,
    reference_image_urls: HashMap<i64, String>,
}

/// Session-scoped generation preferences over a durable storage seam.
pub struct PreferenceStore {
    storage: Arc<dyn PreferenceStorage>,
    state: Mutex<PreferenceState>,
}

impl PreferenceStore {
    /// Creates the store, loading the persisted model map.
    ///
    /// A missing, unreadable, or malformed payload yields an empty map;
    /// every session then reports the catalog defaults.
    pub fn new(storage: Arc<dyn PreferenceStorage>) -> Self {
        let models = match storage.load() {
            Ok(Some(payload)) => serde_json::from_str::<PreferenceMap>(&payload)
                .unwrap_or_else(|err| {
                    tracing::warn!("discarding malformed preference payload: {err}");
                    PreferenceMap::new()
                }),
            Ok(None) => PreferenceMap::new(),
            Err(err) => {
                tracing::warn!("failed to load preferences: {err}");
                PreferenceMap::new()
            }
        };

        Self {
            storage,
            state: Mutex::new(PreferenceState {
                models,
                image_overrides: HashMap::new(),
                reference_image_ids: HashMap::new(),
                reference_image_urls: HashMap::new(),
            }),
        }
    }

    /// The chat model chosen for the session, or the catalog default.
    pub fn chat_model(&self, session_id: i64) -> String {
        let state = self.state.lock().unwrap();
        state
            .models
            .get(&session_id)
            .map(|m| m.chat_model.clone())
            .unwrap_or_else(|| SessionModels::default().chat_model)
    }

    /// The image model chosen for the session, or the catalog default.
    pub fn image_model(&self, session_id: i64) -> String {
        let state = self.state.lock().unwrap();
        state
            .models
            .get(&session_id)
            .map(|m| m.image_model.clone())
            .unwrap_or_else(|| SessionModels::default().image_model)
    }

    /// Records the chat model for the session, preserving the image choice.
    pub fn set_chat_model(&self, session_id: i64, model: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.models.entry(session_id).or_default().chat_model = model.into();
        self.persist(&state.models);
    }

    /// Records the image model for the session, preserving the chat choice.
    pub fn set_image_model(&self, session_id: i64, model: impl Into<String>) {
        let mut state = self.state.lock().unwrap();
        state.models.entry(session_id).or_default().image_model = model.into();
        self.persist(&state.models);
    }

    /// Model defaults merged with the session's overrides; overrides win
    /// per field.
    pub fn image_settings(&self, session_id: i64, model_id: &str) -> ImageGenOptions {
        let mut options = default_image_options(model_id);
        let state = self.state.lock().unwrap();
        if let Some(overrides) = state.image_overrides.get(&session_id) {
            options.apply(overrides);
        }
        options
    }

    /// Shallow-merges a partial update into the session's override set.
    pub fn set_image_settings(&self, session_id: i64, patch: &ImageOptionPatch) {
        let mut state = self.state.lock().unwrap();
        state
            .image_overrides
            .entry(session_id)
            .or_default()
            .merge(patch);
    }

    /// The prior-record reference selection, if any.
    pub fn reference_image_id(&self, session_id: i64) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .reference_image_ids
            .get(&session_id)
            .copied()
    }

    /// Selects a prior image record as the reference; a non-`None` value
    /// clears any uploaded-URL selection for the session.
    pub fn set_reference_image_id(&self, session_id: i64, image_record_id: Option<i64>) {
        let mut state = self.state.lock().unwrap();
        match image_record_id {
            Some(id) => {
                state.reference_image_ids.insert(session_id, id);
                state.reference_image_urls.remove(&session_id);
            }
            None => {
                state.reference_image_ids.remove(&session_id);
            }
        }
    }

    /// The uploaded-URL reference selection, if any.
    pub fn reference_image_url(&self, session_id: i64) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .reference_image_urls
            .get(&session_id)
            .cloned()
    }

    /// Selects an uploaded image as the reference; a non-`None` value clears
    /// any prior-record selection for the session.
    pub fn set_reference_image_url(&self, session_id: i64, url: Option<String>) {
        let mut state = self.state.lock().unwrap();
        match url {
            Some(url) => {
                state.reference_image_urls.insert(session_id, url);
                state.reference_image_ids.remove(&session_id);
            }
            None => {
                state.reference_image_urls.remove(&session_id);
            }
        }
    }

    /// Serializes the full model map through the storage seam.
    ///
    /// Save failures are logged and swallowed; preferences keep working
    /// in memory for the rest of the run.
    fn persist(&self, models: &PreferenceMap) {
        let payload = match serde_json::to_string(models) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!("failed to serialize preferences: {err}");
                return;
            }
        };
        if let Err(err) = self.storage.save(&payload) {
            tracing::warn!("failed to persist preferences: {err}");
        }
    }
}
