use std::io;
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for unifs operations
#[derive(Error, Debug)]
pub enum FsError {
    #[error("File not found at path: {0}")]
    NotFound(String),

    #[error("File already exists at path: {0}")]
    AlreadyExists(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unsupported driver [{0}]")]
    UnsupportedDriver(String),

    #[error("No client is bundled for the {0} driver; register a custom connector under that name")]
    BackendUnavailable(String),

    #[error("Stream state error: {0}")]
    StreamState(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl FsError {
    /// Build an error from an `io::Error` raised while touching `path`,
    /// keeping not-found and permission failures distinguishable.
    pub fn from_io(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path.to_string()),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_string()),
            _ => FsError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

/// Result type alias for unifs operations
pub type Result<T> = std::result::Result<T, FsError>;
