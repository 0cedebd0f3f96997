//! NIST elliptic-curve keys and ECDH.
//!
//! Keys are tagged by curve so callers can hold any supported curve behind
//! one type. ECDH between keys on different curves is rejected.

use std::fmt;

use elliptic_curve::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use warden_types::EcCurve;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::pem::{self, PemBlock};

/// Private key on P-256, P-384 or P-521.
#[derive(Clone)]
pub enum EcPrivateKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

/// Public key on P-256, P-384 or P-521.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EcPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    P521(p521::PublicKey),
}

fn invalid(e: impl fmt::Display) -> CryptoError {
    CryptoError::InvalidKey(e.to_string())
}

impl EcPrivateKey {
    pub fn generate(curve: EcCurve) -> Self {
        match curve {
            EcCurve::P256 => Self::P256(p256::SecretKey::random(&mut OsRng)),
            EcCurve::P384 => Self::P384(p384::SecretKey::random(&mut OsRng)),
            EcCurve::P521 => Self::P521(p521::SecretKey::random(&mut OsRng)),
        }
    }

    /// Parses a PKCS#8 (`PRIVATE KEY`) or SEC1 (`EC PRIVATE KEY`) PEM.
    ///
    /// The curve comes from the key's algorithm parameters.
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let PemBlock { label, contents } = pem::parse_single(pem_text)?;
        match label.as_str() {
            pem::PRIVATE_KEY => Self::from_pkcs8_der(&contents),
            pem::EC_PRIVATE_KEY => Self::from_sec1_der(&contents),
            other => Err(CryptoError::UnsupportedKeyType(other.to_string())),
        }
    }

    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::P256(key));
        }
        if let Ok(key) = p384::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::P384(key));
        }
        p521::SecretKey::from_pkcs8_der(der)
            .map(Self::P521)
            .map_err(|_| CryptoError::InvalidKey("not a P-256, P-384 or P-521 PKCS#8 key".into()))
    }

    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
            return Ok(Self::P256(key));
        }
        if let Ok(key) = p384::SecretKey::from_sec1_der(der) {
            return Ok(Self::P384(key));
        }
        p521::SecretKey::from_sec1_der(der)
            .map(Self::P521)
            .map_err(|_| CryptoError::InvalidKey("not a P-256, P-384 or P-521 SEC1 key".into()))
    }

    pub fn curve(&self) -> EcCurve {
        match self {
            Self::P256(_) => EcCurve::P256,
            Self::P384(_) => EcCurve::P384,
            Self::P521(_) => EcCurve::P521,
        }
    }

    pub fn public_key(&self) -> EcPublicKey {
        match self {
            Self::P256(k) => EcPublicKey::P256(k.public_key()),
            Self::P384(k) => EcPublicKey::P384(k.public_key()),
            Self::P521(k) => EcPublicKey::P521(k.public_key()),
        }
    }

    /// PKCS#8 PEM of the private key.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        let der = match self {
            Self::P256(k) => k.to_pkcs8_der(),
            Self::P384(k) => k.to_pkcs8_der(),
            Self::P521(k) => k.to_pkcs8_der(),
        }
        .map_err(invalid)?;
        Ok(Zeroizing::new(pem::encode_pem(pem::PRIVATE_KEY, der.as_bytes())))
    }

    /// Raw ECDH shared secret (the x-coordinate), one field element long.
    pub fn diffie_hellman(&self, peer: &EcPublicKey) -> Result<Zeroizing<Vec<u8>>> {
        let secret = match (self, peer) {
            (Self::P256(sk), EcPublicKey::P256(pk)) => {
                p256::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            (Self::P384(sk), EcPublicKey::P384(pk)) => {
                p384::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            (Self::P521(sk), EcPublicKey::P521(pk)) => {
                p521::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine())
                    .raw_secret_bytes()
                    .to_vec()
            }
            _ => {
                return Err(CryptoError::CurveMismatch {
                    expected: self.curve(),
                    actual: peer.curve(),
                });
            }
        };
        Ok(Zeroizing::new(secret))
    }
}

impl fmt::Debug for EcPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcPrivateKey")
            .field("curve", &self.curve())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl EcPublicKey {
    /// Parses an SPKI (`PUBLIC KEY`) PEM.
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let PemBlock { label, contents } = pem::parse_single(pem_text)?;
        if label != pem::PUBLIC_KEY {
            return Err(CryptoError::UnsupportedKeyType(label));
        }
        Self::from_der(&contents)
    }

    /// Parses a DER-encoded SubjectPublicKeyInfo.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = p256::PublicKey::from_public_key_der(der) {
            return Ok(Self::P256(key));
        }
        if let Ok(key) = p384::PublicKey::from_public_key_der(der) {
            return Ok(Self::P384(key));
        }
        p521::PublicKey::from_public_key_der(der)
            .map(Self::P521)
            .map_err(|_| CryptoError::InvalidKey("not a P-256, P-384 or P-521 public key".into()))
    }

    /// Parses a SEC1 point, inferring the curve from its encoded length.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            65 | 33 => p256::PublicKey::from_sec1_bytes(bytes)
                .map(Self::P256)
                .map_err(invalid),
            97 | 49 => p384::PublicKey::from_sec1_bytes(bytes)
                .map(Self::P384)
                .map_err(invalid),
            133 | 67 => p521::PublicKey::from_sec1_bytes(bytes)
                .map(Self::P521)
                .map_err(invalid),
            other => Err(CryptoError::InvalidKey(format!(
                "{other}-byte point matches no supported curve"
            ))),
        }
    }

    /// Parses an ephemeral key sent by a client: SPKI DER or a raw SEC1 point.
    pub fn from_ephemeral(bytes: &[u8]) -> Result<Self> {
        // DER starts with a SEQUENCE tag; SEC1 points start with 0x02, 0x03 or 0x04.
        if bytes.first() == Some(&0x30) {
            Self::from_der(bytes)
        } else {
            Self::from_sec1_bytes(bytes)
        }
    }

    pub fn curve(&self) -> EcCurve {
        match self {
            Self::P256(_) => EcCurve::P256,
            Self::P384(_) => EcCurve::P384,
            Self::P521(_) => EcCurve::P521,
        }
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let doc = match self {
            Self::P256(k) => k.to_public_key_der(),
            Self::P384(k) => k.to_public_key_der(),
            Self::P521(k) => k.to_public_key_der(),
        }
        .map_err(invalid)?;
        Ok(doc.into_vec())
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem::encode_pem(pem::PUBLIC_KEY, &self.to_der()?))
    }

    /// Uncompressed SEC1 point (`0x04 || x || y`).
    pub fn to_uncompressed(&self) -> Vec<u8> {
        match self {
            Self::P256(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            Self::P384(k) => k.to_encoded_point(false).as_bytes().to_vec(),
            Self::P521(k) => k.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// Compressed SEC1 point, as carried in NanoTDF headers.
    pub fn to_compressed(&self) -> Vec<u8> {
        match self {
            Self::P256(k) => k.to_encoded_point(true).as_bytes().to_vec(),
            Self::P384(k) => k.to_encoded_point(true).as_bytes().to_vec(),
            Self::P521(k) => k.to_encoded_point(true).as_bytes().to_vec(),
        }
    }
}
