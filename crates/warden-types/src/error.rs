//! Error taxonomy shared by every component.
//!
//! Each crate keeps its own error enum; [`ErrorKind`] is the common
//! classification those errors report, and [`Status`] is what the RPC surface
//! ultimately returns.

use std::fmt::{self, Display};

/// Classification of a failure, independent of which component produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An internal object (cipher, key, connector) could not be constructed.
    CreationFailed,
    /// An upstream collaborator returned an error.
    RetrievalFailed,
    NotFound,
    InvalidArgument,
    /// No key matches the requested algorithm, id or legacy filter.
    CertNotFound,
    /// Policy binding check failed; the key must not be released.
    HmacMismatch,
    UnsupportedAlgorithm,
    Cancelled,
    Unauthenticated,
    FailedPrecondition,
    Internal,
}

/// Status codes of the RPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
    Unauthenticated,
    PermissionDenied,
    Cancelled,
}

impl ErrorKind {
    pub fn status(self) -> Status {
        match self {
            Self::CreationFailed
            | Self::RetrievalFailed
            | Self::UnsupportedAlgorithm
            | Self::Internal => Status::Internal,
            Self::NotFound | Self::CertNotFound => Status::NotFound,
            Self::InvalidArgument => Status::InvalidArgument,
            Self::HmacMismatch => Status::PermissionDenied,
            Self::Cancelled => Status::Cancelled,
            Self::Unauthenticated => Status::Unauthenticated,
            Self::FailedPrecondition => Status::FailedPrecondition,
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CreationFailed => "resource creation failed",
            Self::RetrievalFailed => "resource retrieval failed",
            Self::NotFound => "resource not found",
            Self::InvalidArgument => "invalid argument",
            Self::CertNotFound => "certificate not found",
            Self::HmacMismatch => "policy binding mismatch",
            Self::UnsupportedAlgorithm => "unsupported algorithm",
            Self::Cancelled => "cancelled",
            Self::Unauthenticated => "unauthenticated",
            Self::FailedPrecondition => "failed precondition",
            Self::Internal => "internal error",
        };
        f.write_str(s)
    }
}
