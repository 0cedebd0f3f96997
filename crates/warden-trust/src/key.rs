//! Key metadata and the protected symmetric key.

use std::fmt;

use tracing::warn;
use warden_crypto::{Encapsulator, aead, kdf};
use warden_types::{KeyAlgorithm, KeyIdentifier};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, TrustError};

// ============================================================================
// KeyDetails
// ============================================================================

/// Public description of a wrapping key.
///
/// Carries no private material. `system` names the key manager that can use
/// the private half.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDetails {
    pub id: KeyIdentifier,
    pub algorithm: KeyAlgorithm,
    /// Legacy keys decrypt existing data but never wrap new data.
    pub legacy: bool,
    pub system: String,
    pub public_key_pem: String,
}

impl KeyDetails {
    pub fn new(
        id: impl Into<KeyIdentifier>,
        algorithm: KeyAlgorithm,
        system: impl Into<String>,
        public_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            algorithm,
            legacy: false,
            system: system.into(),
            public_key_pem: public_key_pem.into(),
        }
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// SPKI PEM of the public key.
    pub fn export_public_key(&self) -> &str {
        &self.public_key_pem
    }

    /// Certificates are only kept for EC keys; others have none.
    pub fn export_certificate(&self) -> Result<&str> {
        if self.algorithm.is_rsa() {
            return Err(TrustError::CertNotFound(format!(
                "certificates only available for EC keys, {} is {}",
                self.id, self.algorithm
            )));
        }
        Ok(&self.public_key_pem)
    }
}

// ============================================================================
// ProtectedKey
// ============================================================================

/// A symmetric key unwrapped inside the trust boundary.
///
/// The bytes leave only through [`ProtectedKey::export`]. The backing buffer
/// is zeroed on drop, and the type is neither `Clone` nor `Serialize`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ProtectedKey {
    raw: Vec<u8>,
}

impl ProtectedKey {
    pub fn new(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Checks that `binding == HMAC-SHA256(key, policy)` in constant time.
    pub fn verify_binding(&self, policy: &[u8], binding: &[u8]) -> Result<()> {
        if self.raw.is_empty() {
            return Err(TrustError::EmptyKey);
        }
        if kdf::verify_hmac(&self.raw, policy, binding)? {
            Ok(())
        } else {
            Err(TrustError::HmacMismatch)
        }
    }

    /// Re-wraps the key under `encapsulator`.
    ///
    /// With no encapsulator the raw bytes are returned; only callers inside the
    /// trust boundary may do that.
    pub fn export(&self, encapsulator: Option<&dyn Encapsulator>) -> Result<Vec<u8>> {
        match encapsulator {
            Some(encapsulator) => encapsulator.encrypt(&self.raw).map_err(|e| {
                warn!(error = %e, "failed to encrypt key data for export");
                TrustError::from(e)
            }),
            None => {
                warn!("exporting raw key data without encryption");
                Ok(self.raw.clone())
            }
        }
    }

    /// Decrypts `body` (ciphertext plus a trailing tag of `tag_size` bytes) under this key.
    pub fn decrypt_aes_gcm(&self, iv: &[u8], body: &[u8], tag_size: usize) -> Result<Vec<u8>> {
        Ok(aead::decrypt_with_iv(&self.raw, iv, body, tag_size, b"")?)
    }
}

impl fmt::Debug for ProtectedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedKey")
            .field("len", &self.raw.len())
            .finish_non_exhaustive()
    }
}
