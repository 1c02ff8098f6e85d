pub mod error;
pub mod generation;
pub mod job;
pub mod models;
pub mod preferences;
pub mod session;

// Re-export common error type
pub use error::{Result, WeavError};
