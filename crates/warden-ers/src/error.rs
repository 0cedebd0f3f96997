//! Entity resolution error types

use thiserror::Error;
use warden_types::{Cancelled, ErrorKind};

pub type Result<T> = std::result::Result<T, ErsError>;

#[derive(Debug, Error)]
pub enum ErsError {
    #[error("resource creation failed: {0}")]
    CreationFailed(String),

    #[error("resource retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("resource not found: {entity}")]
    NotFound { entity: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("error parsing jwt: {0}")]
    InvalidJwt(String),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ErsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CreationFailed(_) => ErrorKind::CreationFailed,
            Self::RetrievalFailed(_) => ErrorKind::RetrievalFailed,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) | Self::InvalidJwt(_) => ErrorKind::InvalidArgument,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn retrieval(context: &str, err: impl std::fmt::Display) -> Self {
        Self::RetrievalFailed(format!("{context}: {err}"))
    }
}
