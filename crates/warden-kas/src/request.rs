//! Parsed rewrap requests and their results.

use std::fmt::{self, Display};

use warden_types::{EcCurve, KeyAlgorithm, KeyIdentifier, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrapRequest {
    /// SPKI PEM the rewrapped keys are encrypted to.
    pub client_public_key: String,
    /// Bearer token of the requester; its entity chain is the principal set.
    pub token: Token,
    pub key_access_objects: Vec<KeyAccessObject>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAccessObject {
    /// Echoed back in the object's result.
    pub id: String,
    /// Wrapping key. When absent the active key for `algorithm` is used.
    pub kid: Option<KeyIdentifier>,
    /// Defaults to [`KeyAlgorithm::DEFAULT`].
    pub algorithm: Option<KeyAlgorithm>,
    pub access: KeyAccess,
}

impl KeyAccessObject {
    pub fn wrapped(id: impl Into<String>, access: WrappedKeyAccess) -> Self {
        Self {
            id: id.into(),
            kid: None,
            algorithm: None,
            access: KeyAccess::Wrapped(access),
        }
    }

    pub fn nano(id: impl Into<String>, access: NanoKeyAccess) -> Self {
        Self {
            id: id.into(),
            kid: None,
            algorithm: Some(KeyAlgorithm::Ec(access.curve)),
            access: KeyAccess::Nano(access),
        }
    }

    pub fn with_kid(mut self, kid: impl Into<KeyIdentifier>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn with_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm.unwrap_or(KeyAlgorithm::DEFAULT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAccess {
    /// TDF: a DEK wrapped under the KAS key.
    Wrapped(WrappedKeyAccess),
    /// NanoTDF: the DEK is derived from the header's ephemeral point.
    Nano(NanoKeyAccess),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKeyAccess {
    pub wrapped_key: Vec<u8>,
    /// Required for EC wrapping keys, ignored for RSA.
    pub ephemeral_public_key: Option<Vec<u8>>,
    /// Base64 JSON policy; the binding is computed over this exact string.
    pub policy: String,
    /// Base64 HMAC-SHA256 of `policy` under the DEK.
    pub policy_binding: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NanoKeyAccess {
    /// SEC1 point (compressed or not) from the NanoTDF header.
    pub ephemeral_public_key: Vec<u8>,
    pub curve: EcCurve,
    pub policy: NanoPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NanoPolicy {
    /// Policy JSON in the clear.
    Plaintext(Vec<u8>),
    /// Policy JSON sealed under the derived key.
    Encrypted {
        iv: Vec<u8>,
        body: Vec<u8>,
        tag_size: usize,
    },
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrapResponse {
    /// Ephemeral public key the client combines with its private key to open
    /// the rewrapped keys. Empty when the client key is RSA.
    pub session_public_key: String,
    /// One result per key access object, in request order.
    pub results: Vec<KeyAccessResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAccessResult {
    Permit { id: String, entity_wrapped_key: Vec<u8> },
    Fail { id: String, reason: FailureReason },
}

impl KeyAccessResult {
    pub fn id(&self) -> &str {
        match self {
            Self::Permit { id, .. } | Self::Fail { id, .. } => id,
        }
    }
}

/// Why a key access object was refused. Never says which rule or attribute
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Forbidden,
    BadRequest,
    Internal,
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forbidden => f.write_str("forbidden"),
            Self::BadRequest => f.write_str("bad request"),
            Self::Internal => f.write_str("internal"),
        }
    }
}
