//! Entitlements error types

use thiserror::Error;
use warden_ers::ErsError;
use warden_types::{Cancelled, ErrorKind, FqnError};

pub type Result<T> = std::result::Result<T, EntitlementsError>;

#[derive(Debug, Error)]
pub enum EntitlementsError {
    #[error("error: missing value in fqn scope")]
    MissingScope,

    #[error("entity chain is required")]
    MissingEntities,

    #[error("attribute value not found: {fqn}")]
    AttributeNotFound { fqn: String },

    #[error("resource retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("no policy at path {0}")]
    UnknownPath(String),

    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    #[error("policy result for entity {entity_id} is malformed: {reason}")]
    InvalidResult { entity_id: String, reason: String },

    #[error("idp token request failed: {0}")]
    Token(String),

    #[error(transparent)]
    Fqn(#[from] FqnError),

    #[error(transparent)]
    Ers(#[from] ErsError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl EntitlementsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingScope | Self::MissingEntities | Self::Fqn(_) => ErrorKind::InvalidArgument,
            Self::AttributeNotFound { .. } => ErrorKind::NotFound,
            Self::RetrievalFailed(_) | Self::UnknownPath(_) | Self::Token(_) => {
                ErrorKind::RetrievalFailed
            }
            Self::Evaluation(_) | Self::InvalidResult { .. } => ErrorKind::Internal,
            Self::Ers(e) => e.kind(),
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}
