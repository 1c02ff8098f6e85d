//! Unified path management for weav client files.
//!
//! All durable client state lives under the platform config directory
//! (e.g. `~/.config/weav/` on Linux). This keeps path resolution in one
//! place so every storage implementation agrees on the layout.
//!
//! ```text
//! ~/.config/weav/
//! └── session_models.json    # per-session model preferences
//! ```

use std::path::PathBuf;
use weav_core::{Result, WeavError};

/// Unified path management for weav.
pub struct WeavPaths;

impl WeavPaths {
    /// Returns the weav configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/weav/`)
    /// - `Err(_)`: The platform config directory could not be determined
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("weav"))
            .ok_or_else(|| WeavError::config("cannot determine platform config directory"))
    }

    /// Returns the path to the per-session model preference file.
    pub fn preferences_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("session_models.json"))
    }
}
