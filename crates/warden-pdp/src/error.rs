//! PDP error types

use thiserror::Error;
use warden_types::{ErrorKind, FqnError};

pub type Result<T> = std::result::Result<T, PdpError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PdpError {
    #[error(transparent)]
    InvalidFqn(#[from] FqnError),

    #[error("expected an attribute definition under the FQN {0}")]
    MissingDefinition(String),

    #[error("attribute definition rule cannot be unspecified: {0}")]
    UnspecifiedRule(String),
}

impl PdpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFqn(_) => ErrorKind::InvalidArgument,
            Self::MissingDefinition(_) => ErrorKind::Internal,
            Self::UnspecifiedRule(_) => ErrorKind::FailedPrecondition,
        }
    }
}
