//! Application services for the weav client.
//!
//! Three services compose the client's state layer:
//!
//! - [`SessionDirectory`]: the single source of truth for the session list
//!   and the currently open session.
//! - [`PreferenceStore`]: per-session model choice and image generation
//!   options, persisted across runs.
//! - [`GenerationOrchestrator`]: drives one submit→poll→refresh cycle per
//!   request, with cooperative cancellation.

pub mod directory;
pub mod orchestrator;
pub mod poll;
pub mod preferences;

pub use directory::SessionDirectory;
pub use orchestrator::GenerationOrchestrator;
pub use poll::{PollConfig, Sleeper, TokioSleeper};
pub use preferences::PreferenceStore;
