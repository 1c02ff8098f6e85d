//! HTTP client for the weav backend.
//!
//! [`HttpApi`] implements the `SessionApi` and `GenerationApi` traits from
//! `weav-core` against the backend's REST endpoints.

pub mod config;
pub mod http;

pub use config::ApiConfig;
pub use http::HttpApi;
