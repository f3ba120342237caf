//! Error types and load result structures for profile stores.

use std::path::PathBuf;

use crate::schema::ProfileId;

/// Errors that can occur while loading or watching profiles.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse/deserialization error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Profile document is well-formed but unusable.
    #[error("Invalid profile: {0}")]
    Invalid(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Outcome of loading a single profile file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded { profile_id: ProfileId },
    /// Dotfile or unsupported extension.
    Skipped { reason: String },
    Failed { error: String },
}
