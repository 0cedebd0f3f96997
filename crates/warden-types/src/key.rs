//! Key metadata shared by the trust layer and the orchestrator.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named elliptic curves supported for wrapping keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    /// Length in bytes of a field element, and so of an ECDH shared secret.
    pub fn field_size(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    pub fn sec_name(self) -> &'static str {
        match self {
            Self::P256 => "secp256r1",
            Self::P384 => "secp384r1",
            Self::P521 => "secp521r1",
        }
    }
}

impl Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sec_name())
    }
}

impl FromStr for EcCurve {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "secp256r1" | "p-256" | "p256" | "prime256v1" => Ok(Self::P256),
            "secp384r1" | "p-384" | "p384" => Ok(Self::P384),
            "secp521r1" | "p-521" | "p521" => Ok(Self::P521),
            _ => Err(ParseAlgorithmError(s.to_string())),
        }
    }
}

/// Wrapping-key algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyAlgorithm {
    Rsa2048,
    Rsa4096,
    Ec(EcCurve),
}

impl KeyAlgorithm {
    /// Algorithm assumed when a key access object does not name one.
    pub const DEFAULT: Self = Self::Rsa2048;

    pub fn is_rsa(self) -> bool {
        matches!(self, Self::Rsa2048 | Self::Rsa4096)
    }

    pub fn curve(self) -> Option<EcCurve> {
        match self {
            Self::Ec(curve) => Some(curve),
            _ => None,
        }
    }
}

impl Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa2048 => f.write_str("rsa:2048"),
            Self::Rsa4096 => f.write_str("rsa:4096"),
            Self::Ec(curve) => write!(f, "ec:{curve}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported algorithm: {0}")]
pub struct ParseAlgorithmError(pub String);

impl FromStr for KeyAlgorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rsa:2048" => Ok(Self::Rsa2048),
            "rsa:4096" => Ok(Self::Rsa4096),
            other => other
                .strip_prefix("ec:")
                .and_then(|curve| curve.parse().ok())
                .map(Self::Ec)
                .ok_or_else(|| ParseAlgorithmError(s.to_string())),
        }
    }
}

impl TryFrom<String> for KeyAlgorithm {
    type Error = ParseAlgorithmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyAlgorithm> for String {
    fn from(alg: KeyAlgorithm) -> Self {
        alg.to_string()
    }
}

/// Identifier of a wrapping key (the "kid").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyIdentifier(String);

impl KeyIdentifier {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for KeyIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}
