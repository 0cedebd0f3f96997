//! Key index and manager over a keyring held in process memory.

use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};
use warden_crypto::Encapsulator;
use warden_types::{EcCurve, KeyAlgorithm, KeyIdentifier, RequestContext};
use zeroize::Zeroizing;

use crate::error::{Result, TrustError};
use crate::key::{KeyDetails, ProtectedKey};
use crate::service::{KeyIndex, KeyManager, ListKeyOptions};
use crate::unwrap;

/// System name reported by keys served from the in-process keyring.
pub const IN_PROCESS_SYSTEM: &str = "opentdf.io/in-process";

// ============================================================================
// Keyring entries
// ============================================================================

/// One configured key.
///
/// `cert` optionally carries the public key PEM; when empty it is derived from
/// the private key.
#[derive(Clone, Deserialize)]
pub struct KeyringEntry {
    pub kid: String,
    pub alg: KeyAlgorithm,
    pub private_pem: String,
    #[serde(default)]
    pub cert: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub legacy: bool,
}

fn default_active() -> bool {
    true
}

impl KeyringEntry {
    pub fn new(kid: impl Into<String>, alg: KeyAlgorithm, private_pem: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            alg,
            private_pem: private_pem.into(),
            cert: String::new(),
            active: true,
            legacy: false,
        }
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

impl fmt::Debug for KeyringEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyringEntry")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .field("private_pem", &"<redacted>")
            .field("active", &self.active)
            .field("legacy", &self.legacy)
            .finish()
    }
}

/// Merges entries that share a kid.
///
/// `legacy` is sticky once any entry sets it; `active` takes the last value
/// seen. Key material comes from the first entry that has it. First-seen order
/// is kept.
pub fn consolidate_keyring(entries: impl IntoIterator<Item = KeyringEntry>) -> Vec<KeyringEntry> {
    let mut merged: Vec<KeyringEntry> = Vec::new();
    for entry in entries {
        match merged.iter_mut().find(|m| m.kid == entry.kid) {
            Some(existing) => {
                existing.legacy |= entry.legacy;
                existing.active = entry.active;
                if existing.private_pem.is_empty() {
                    existing.private_pem = entry.private_pem;
                }
                if existing.cert.is_empty() {
                    existing.cert = entry.cert;
                }
            }
            None => merged.push(entry),
        }
    }
    merged
}

// ============================================================================
// InProcessProvider
// ============================================================================

struct LoadedKey {
    details: KeyDetails,
    active: bool,
    private_pem: Zeroizing<String>,
}

/// Serves a fixed keyring as both [`KeyIndex`] and [`KeyManager`].
///
/// Closing drops every private key; later operations fail with
/// [`TrustError::Closed`].
pub struct InProcessProvider {
    keys: RwLock<Option<Vec<LoadedKey>>>,
}

impl InProcessProvider {
    /// Consolidates and loads `entries`, failing on the first key that does
    /// not parse or does not match its algorithm.
    pub fn new(entries: impl IntoIterator<Item = KeyringEntry>) -> Result<Self> {
        let mut keys = Vec::new();
        for entry in consolidate_keyring(entries) {
            let public_key_pem = if entry.cert.trim().is_empty() {
                unwrap::public_pem_for(entry.alg, &entry.private_pem)?
            } else {
                // Still parse the private key so a bad keyring fails at load.
                unwrap::public_pem_for(entry.alg, &entry.private_pem)?;
                entry.cert.clone()
            };
            let details = KeyDetails::new(
                entry.kid.as_str(),
                entry.alg,
                IN_PROCESS_SYSTEM,
                public_key_pem,
            )
            .with_legacy(entry.legacy);
            debug!(kid = %details.id, alg = %entry.alg, legacy = entry.legacy, active = entry.active, "loaded key");
            keys.push(LoadedKey {
                details,
                active: entry.active,
                private_pem: Zeroizing::new(entry.private_pem),
            });
        }
        info!(keys = keys.len(), "in-process keyring loaded");
        Ok(Self {
            keys: RwLock::new(Some(keys)),
        })
    }

    fn with_keys<T>(&self, f: impl FnOnce(&[LoadedKey]) -> Result<T>) -> Result<T> {
        let guard = self.keys.read();
        let keys = guard.as_deref().ok_or(TrustError::Closed)?;
        f(keys)
    }

    fn private_pem(&self, id: &KeyIdentifier) -> Result<Zeroizing<String>> {
        self.with_keys(|keys| {
            keys.iter()
                .find(|k| &k.details.id == id)
                .map(|k| k.private_pem.clone())
                .ok_or_else(|| TrustError::CertNotFound(id.to_string()))
        })
    }
}

impl fmt::Debug for InProcessProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.keys.read();
        let mut s = f.debug_struct("InProcessProvider");
        match guard.as_deref() {
            Some(keys) => s.field(
                "kids",
                &keys.iter().map(|k| k.details.id.as_str()).collect::<Vec<_>>(),
            ),
            None => s.field("closed", &true),
        };
        s.finish()
    }
}

#[async_trait]
impl KeyIndex for InProcessProvider {
    async fn find_key_by_algorithm(
        &self,
        ctx: &RequestContext,
        algorithm: KeyAlgorithm,
        include_legacy: bool,
    ) -> Result<KeyDetails> {
        ctx.check()?;
        self.with_keys(|keys| {
            let candidates = || {
                keys.iter()
                    .filter(move |k| k.active && k.details.algorithm == algorithm)
            };
            candidates()
                .find(|k| !k.details.legacy)
                .or_else(|| {
                    include_legacy
                        .then(|| candidates().find(|k| k.details.legacy))
                        .flatten()
                })
                .map(|k| k.details.clone())
                .ok_or_else(|| TrustError::CertNotFound(format!("no active key for {algorithm}")))
        })
    }

    async fn find_key_by_id(&self, ctx: &RequestContext, id: &KeyIdentifier) -> Result<KeyDetails> {
        ctx.check()?;
        self.with_keys(|keys| {
            keys.iter()
                .find(|k| &k.details.id == id)
                .map(|k| k.details.clone())
                .ok_or_else(|| TrustError::CertNotFound(id.to_string()))
        })
    }

    async fn list_keys_with(&self, ctx: &RequestContext, opts: ListKeyOptions) -> Result<Vec<KeyDetails>> {
        ctx.check()?;
        self.with_keys(|keys| {
            Ok(keys
                .iter()
                .filter(|k| !opts.legacy_only || k.details.legacy)
                .map(|k| k.details.clone())
                .collect())
        })
    }
}

#[async_trait]
impl KeyManager for InProcessProvider {
    fn name(&self) -> &str {
        IN_PROCESS_SYSTEM
    }

    async fn decrypt(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey> {
        ctx.check()?;
        let pem = self.private_pem(&key.id)?;
        unwrap::decrypt_with_pem(key, &pem, ciphertext, ephemeral_public_key)
    }

    async fn derive_key(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
    ) -> Result<ProtectedKey> {
        ctx.check()?;
        let pem = self.private_pem(&key.id)?;
        unwrap::derive_with_pem(key, &pem, ephemeral_public_key, curve)
    }

    async fn generate_ec_session_key(
        &self,
        ctx: &RequestContext,
        ephemeral_public_key_pem: &str,
    ) -> Result<Box<dyn Encapsulator>> {
        ctx.check()?;
        unwrap::session_encapsulator(ephemeral_public_key_pem)
    }

    fn close(&self) {
        if self.keys.write().take().is_some() {
            debug!("in-process keyring closed");
        }
    }
}
