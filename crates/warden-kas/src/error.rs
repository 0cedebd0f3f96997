//! KAS error types

use thiserror::Error;
use warden_authorization::AuthorizationError;
use warden_ers::ErsError;
use warden_trust::TrustError;
use warden_types::{Cancelled, ErrorKind};

use crate::state::RewrapState;

pub type Result<T> = std::result::Result<T, KasError>;

#[derive(Debug, Error)]
pub enum KasError {
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid policy binding: {0}")]
    InvalidBinding(String),

    #[error("invalid key access object: {0}")]
    InvalidKeyAccess(String),

    #[error("client public key rejected: {0}")]
    InvalidClientKey(String),

    #[error("rewrap cannot move from {from} to {to}")]
    InvalidTransition { from: RewrapState, to: RewrapState },

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Ers(#[from] ErsError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl KasError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPolicy(_)
            | Self::InvalidBinding(_)
            | Self::InvalidKeyAccess(_)
            | Self::InvalidClientKey(_) => ErrorKind::InvalidArgument,
            Self::InvalidTransition { .. } => ErrorKind::Internal,
            Self::Authorization(e) => e.kind(),
            Self::Ers(e) => e.kind(),
            Self::Trust(e) => e.kind(),
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
