//! Unified path management for mentor data files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.local/share/mentor/       # Data directory
//! └── sessions/                # One JSON file per session
//!     ├── <session-id>.json
//!     └── <session-id>.lock    # Transient write locks
//! ```

use mentor_core::{MentorError, Result};
use std::path::PathBuf;

/// Path resolution for mentor's on-disk layout.
pub struct MentorPaths;

impl MentorPaths {
    /// Returns the mentor data directory (e.g. `~/.local/share/mentor`).
    ///
    /// # Errors
    ///
    /// Returns `Config` when the platform data directory cannot be
    /// determined.
    pub fn data_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("mentor"))
            .ok_or_else(|| MentorError::config("cannot determine platform data directory"))
    }

    /// Returns the sessions directory under a data directory.
    pub fn sessions_dir(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join("sessions")
    }
}
