//! Crypto error types

use thiserror::Error;
use warden_types::{EcCurve, ErrorKind};

use crate::pem::PemError;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error(transparent)]
    Pem(#[from] PemError),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("curve mismatch: key is {expected}, peer is {actual}")]
    CurveMismatch { expected: EcCurve, actual: EcCurve },

    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported AES-GCM tag size: {0} bytes")]
    UnsupportedTagSize(usize),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Pem(_) | Self::InvalidKey(_) => ErrorKind::CreationFailed,
            Self::UnsupportedKeyType(_) => ErrorKind::UnsupportedAlgorithm,
            Self::CurveMismatch { .. }
            | Self::InvalidLength { .. }
            | Self::UnsupportedTagSize(_)
            | Self::Decrypt(_) => ErrorKind::InvalidArgument,
            Self::Encrypt(_) | Self::Kdf(_) => ErrorKind::Internal,
        }
    }
}
