use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while walking, caching or downloading drive content
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Root folder not found: {name}")]
    RootNotFound { name: String },

    #[error("Remote directory unavailable: {message}")]
    RemoteUnavailable { message: String },

    #[error("Cache at {} is unreadable: {source}", .path.display())]
    CorruptCache {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Cannot persist cache to {}: {source}", .path.display())]
    PersistUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot download '{id}': {message}")]
    DownloadFailed { id: String, message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DriveError {
    pub(crate) fn remote(message: impl Into<String>) -> Self {
        DriveError::RemoteUnavailable {
            message: message.into(),
        }
    }

    pub(crate) fn auth(message: impl Into<String>) -> Self {
        DriveError::Auth {
            message: message.into(),
        }
    }
}

/// Result type alias for drive operations
pub type Result<T> = std::result::Result<T, DriveError>;
