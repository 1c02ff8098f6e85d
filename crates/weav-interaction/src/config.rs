//! API client configuration.
//!
//! One setting: the backend origin, resolved once at startup. Everything
//! else about the client's behavior is compile-time.

use std::env;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const BASE_URL_ENV: &str = "WEAV_API_BASE_URL";

/// Connection settings for the weav backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
}

impl ApiConfig {
    /// Creates a config pointing at an explicit origin.
    ///
    /// Trailing slashes are stripped so endpoint paths can be joined
    /// uniformly.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolves the origin from `WEAV_API_BASE_URL`, falling back to the
    /// local development default.
    pub fn from_env() -> Self {
        let base_url = env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
