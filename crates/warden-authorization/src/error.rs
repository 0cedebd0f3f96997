//! Authorization error types

use thiserror::Error;
use warden_entitlements::EntitlementsError;
use warden_ers::ErsError;
use warden_pdp::PdpError;
use warden_types::{ErrorKind, FqnError};

pub type Result<T> = std::result::Result<T, AuthorizationError>;

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("invalid attribute definition: {0}")]
    InvalidFqn(#[from] FqnError),

    #[error("attribute value {0} was not returned by the policy store")]
    MissingAttributeValue(String),

    #[error(transparent)]
    Entitlements(#[from] EntitlementsError),

    #[error(transparent)]
    Ers(#[from] ErsError),

    #[error("access decision failed: {0}")]
    Pdp(#[from] PdpError),
}

impl AuthorizationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFqn(_) => ErrorKind::InvalidArgument,
            Self::MissingAttributeValue(_) => ErrorKind::NotFound,
            Self::Entitlements(e) => e.kind(),
            Self::Ers(e) => e.kind(),
            Self::Pdp(e) => e.kind(),
        }
    }
}
