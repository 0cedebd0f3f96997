//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;
use warden_types::ErrorKind;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to write config file at {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to merge configuration: {0}")]
    MergeError(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Project already initialized: {0} exists")]
    AlreadyInitialized(PathBuf),

    #[error("XDG directory error: {0}")]
    XdgError(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::MergeError(_) => ErrorKind::InvalidArgument,
            Self::AlreadyInitialized(_) => ErrorKind::FailedPrecondition,
            Self::WriteError { .. } | Self::XdgError(_) => ErrorKind::Internal,
        }
    }
}
