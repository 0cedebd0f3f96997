//! Trust layer error types

use thiserror::Error;
use warden_crypto::CryptoError;
use warden_types::{Cancelled, ErrorKind, KeyIdentifier};

pub type Result<T> = std::result::Result<T, TrustError>;

#[derive(Debug, Error)]
pub enum TrustError {
    #[error("certificate not found: {0}")]
    CertNotFound(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("key data is empty")]
    EmptyKey,

    #[error("policy hmac mismatch")]
    HmacMismatch,

    #[error("ephemeral public key is required for EC decryption")]
    MissingEphemeralKey,

    #[error("failed to hex decode root key")]
    RootKeyDecode,

    #[error("root key must be 32 bytes, got {0}")]
    RootKeyLength(usize),

    #[error("failed to base64 decode wrapped key")]
    WrappedKeyDecode,

    #[error("failed to decrypt wrapped key")]
    WrappedKeyDecrypt,

    #[error("key manager is closed")]
    Closed,

    #[error("no default key manager mode configured")]
    NoDefaultManager,

    #[error("factory for key manager '{name}' failed: {source}")]
    Factory {
        name: String,
        #[source]
        source: Box<TrustError>,
    },

    #[error("key store lookup for {kid} failed: {reason}")]
    Store { kid: KeyIdentifier, reason: String },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl TrustError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CertNotFound(_) => ErrorKind::CertNotFound,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::HmacMismatch => ErrorKind::HmacMismatch,
            Self::EmptyKey | Self::MissingEphemeralKey => ErrorKind::InvalidArgument,
            Self::RootKeyDecode
            | Self::RootKeyLength(_)
            | Self::WrappedKeyDecode
            | Self::WrappedKeyDecrypt
            | Self::NoDefaultManager => ErrorKind::CreationFailed,
            Self::Closed => ErrorKind::FailedPrecondition,
            Self::Factory { source, .. } => source.kind(),
            Self::Store { .. } => ErrorKind::RetrievalFailed,
            Self::Crypto(e) => e.kind(),
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}
