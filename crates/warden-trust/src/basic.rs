//! Key manager for private keys stored wrapped under a root key.
//!
//! Private key PEMs are kept in a [`WrappedKeyStore`] as
//! `base64(nonce || AES-256-GCM(root, pem))`. The manager unwraps on demand and
//! keeps the plaintext PEM in the shared cache until closed.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use warden_cache::Cache;
use warden_crypto::{Encapsulator, aead};
use warden_types::{EcCurve, KeyAlgorithm, KeyIdentifier, RequestContext};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, TrustError};
use crate::key::{KeyDetails, ProtectedKey};
use crate::service::{KeyIndex, KeyManager, ListKeyOptions};
use crate::unwrap;

/// System name for keys managed by [`BasicManager`].
pub const BASIC_SYSTEM: &str = "opentdf.io/basic";

const ROOT_KEY_LEN: usize = 32;

// ============================================================================
// Wrapped key store
// ============================================================================

/// A private key as persisted: wrapped under the root key.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub kid: KeyIdentifier,
    pub algorithm: KeyAlgorithm,
    /// `base64(nonce || ciphertext || tag)`.
    pub wrapped: String,
    pub public_key_pem: String,
    pub legacy: bool,
    pub active: bool,
}

impl WrappedKey {
    fn details(&self) -> KeyDetails {
        KeyDetails::new(
            self.kid.clone(),
            self.algorithm,
            BASIC_SYSTEM,
            self.public_key_pem.clone(),
        )
        .with_legacy(self.legacy)
    }
}

impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("legacy", &self.legacy)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Persistent storage of wrapped keys.
#[async_trait]
pub trait WrappedKeyStore: Send + Sync + fmt::Debug {
    async fn fetch(&self, kid: &KeyIdentifier) -> Result<Option<WrappedKey>>;

    async fn list(&self) -> Result<Vec<WrappedKey>>;
}

/// [`WrappedKeyStore`] backed by a vector, for tests and single-node setups.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<Vec<WrappedKey>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the key with the same kid.
    pub fn insert(&self, key: WrappedKey) {
        let mut keys = self.keys.write();
        match keys.iter_mut().find(|k| k.kid == key.kid) {
            Some(existing) => *existing = key,
            None => keys.push(key),
        }
    }
}

#[async_trait]
impl WrappedKeyStore for InMemoryKeyStore {
    async fn fetch(&self, kid: &KeyIdentifier) -> Result<Option<WrappedKey>> {
        Ok(self.keys.read().iter().find(|k| &k.kid == kid).cloned())
    }

    async fn list(&self) -> Result<Vec<WrappedKey>> {
        Ok(self.keys.read().clone())
    }
}

/// [`KeyIndex`] over the public half of a [`WrappedKeyStore`].
#[derive(Debug, Clone)]
pub struct StoreKeyIndex {
    store: Arc<dyn WrappedKeyStore>,
}

impl StoreKeyIndex {
    pub fn new(store: Arc<dyn WrappedKeyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KeyIndex for StoreKeyIndex {
    async fn find_key_by_algorithm(
        &self,
        ctx: &RequestContext,
        algorithm: KeyAlgorithm,
        include_legacy: bool,
    ) -> Result<KeyDetails> {
        let keys = ctx.run(self.store.list()).await??;
        let candidates = || {
            keys.iter()
                .filter(move |k| k.active && k.algorithm == algorithm)
        };
        candidates()
            .find(|k| !k.legacy)
            .or_else(|| {
                include_legacy
                    .then(|| candidates().find(|k| k.legacy))
                    .flatten()
            })
            .map(WrappedKey::details)
            .ok_or_else(|| TrustError::CertNotFound(format!("no active key for {algorithm}")))
    }

    async fn find_key_by_id(&self, ctx: &RequestContext, id: &KeyIdentifier) -> Result<KeyDetails> {
        ctx.run(self.store.fetch(id))
            .await??
            .map(|k| k.details())
            .ok_or_else(|| TrustError::CertNotFound(id.to_string()))
    }

    async fn list_keys_with(&self, ctx: &RequestContext, opts: ListKeyOptions) -> Result<Vec<KeyDetails>> {
        let keys = ctx.run(self.store.list()).await??;
        Ok(keys
            .iter()
            .filter(|k| !opts.legacy_only || k.legacy)
            .map(WrappedKey::details)
            .collect())
    }
}

// ============================================================================
// Root key
// ============================================================================

fn decode_root_key(root_key_hex: &str) -> Result<Zeroizing<[u8; ROOT_KEY_LEN]>> {
    let decoded = Zeroizing::new(hex::decode(root_key_hex.trim()).map_err(|_| TrustError::RootKeyDecode)?);
    let mut key = Zeroizing::new([0u8; ROOT_KEY_LEN]);
    if decoded.len() != ROOT_KEY_LEN {
        return Err(TrustError::RootKeyLength(decoded.len()));
    }
    key.copy_from_slice(&decoded);
    Ok(key)
}

/// Wraps a private key PEM under a hex root key, producing the stored form.
pub fn wrap_private_key(root_key_hex: &str, private_pem: &str) -> Result<String> {
    let root = decode_root_key(root_key_hex)?;
    let sealed = aead::seal(root.as_slice(), private_pem.as_bytes())?;
    Ok(BASE64.encode(sealed))
}

struct CachedPem(Zeroizing<String>);

// ============================================================================
// BasicManager
// ============================================================================

/// Unwraps stored private keys with a root key held in memory.
pub struct BasicManager {
    root_key: RwLock<Option<Zeroizing<[u8; ROOT_KEY_LEN]>>>,
    store: Arc<dyn WrappedKeyStore>,
    cache: Option<Arc<dyn Cache>>,
    ttl: Option<Duration>,
    cached: Mutex<HashSet<String>>,
}

impl BasicManager {
    /// Fails if the root key is not 32 bytes of hex.
    pub fn new(root_key_hex: &str, store: Arc<dyn WrappedKeyStore>) -> Result<Self> {
        Ok(Self {
            root_key: RwLock::new(Some(decode_root_key(root_key_hex)?)),
            store,
            cache: None,
            ttl: None,
            cached: Mutex::new(HashSet::new()),
        })
    }

    /// Caches unwrapped PEMs in `cache`, expiring after `ttl` (`None` uses the
    /// cache default).
    pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl: Option<Duration>) -> Self {
        self.cache = Some(cache);
        self.ttl = ttl;
        self
    }

    fn cache_key(kid: &KeyIdentifier) -> String {
        format!("{BASIC_SYSTEM}::{kid}")
    }

    fn unwrap_pem(&self, wrapped: &str) -> Result<Zeroizing<String>> {
        let guard = self.root_key.read();
        let root = guard.as_ref().ok_or(TrustError::Closed)?;
        let blob = BASE64
            .decode(wrapped.trim())
            .map_err(|_| TrustError::WrappedKeyDecode)?;
        let plain = aead::open(root.as_slice(), &blob).map_err(|_| TrustError::WrappedKeyDecrypt)?;
        String::from_utf8(plain).map(Zeroizing::new).map_err(|e| {
            e.into_bytes().zeroize();
            TrustError::WrappedKeyDecrypt
        })
    }

    async fn private_pem(&self, ctx: &RequestContext, kid: &KeyIdentifier) -> Result<Arc<CachedPem>> {
        if self.root_key.read().is_none() {
            return Err(TrustError::Closed);
        }

        let key = Self::cache_key(kid);
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get_as::<CachedPem>(&key)) {
            debug!(%kid, "private key cache hit");
            return Ok(hit);
        }

        let wrapped = ctx
            .run(self.store.fetch(kid))
            .await??
            .ok_or_else(|| TrustError::CertNotFound(kid.to_string()))?;
        let pem = Arc::new(CachedPem(self.unwrap_pem(&wrapped.wrapped)?));

        if let Some(cache) = &self.cache {
            let cost = pem.0.len() as u64;
            let stored = match self.ttl {
                Some(ttl) => cache.set_with_ttl(&key, pem.clone(), cost, Some(ttl)),
                None => cache.set(&key, pem.clone(), cost),
            };
            if stored {
                self.cached.lock().insert(key);
            } else {
                warn!(%kid, "cache rejected unwrapped private key");
            }
        }
        Ok(pem)
    }
}

impl fmt::Debug for BasicManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicManager")
            .field("closed", &self.root_key.read().is_none())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyManager for BasicManager {
    fn name(&self) -> &str {
        BASIC_SYSTEM
    }

    async fn decrypt(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey> {
        let pem = self.private_pem(ctx, &key.id).await?;
        unwrap::decrypt_with_pem(key, &pem.0, ciphertext, ephemeral_public_key)
    }

    async fn derive_key(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
    ) -> Result<ProtectedKey> {
        let pem = self.private_pem(ctx, &key.id).await?;
        unwrap::derive_with_pem(key, &pem.0, ephemeral_public_key, curve)
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
        self.root_key.write().take();
        let cached: Vec<String> = self.cached.lock().drain().collect();
        if let Some(cache) = &self.cache {
            for key in &cached {
                cache.delete(key);
            }
        }
        debug!(evicted = cached.len(), "basic key manager closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_keys;
    use warden_cache::{CacheConfig, TtlCache};
    use warden_crypto::rsa::RsaEncryptor;

    const ROOT: &str = "0b0c0d0e0f101112131415161718191a1b1c1d1e1f202122232425262728292a";

    fn store_with_rsa() -> (Arc<InMemoryKeyStore>, String) {
        let store = Arc::new(InMemoryKeyStore::new());
        let pem = test_keys::rsa_pem();
        let public = unwrap::public_pem_for(KeyAlgorithm::Rsa2048, pem).unwrap();
        store.insert(WrappedKey {
            kid: "b1".into(),
            algorithm: KeyAlgorithm::Rsa2048,
            wrapped: wrap_private_key(ROOT, pem).unwrap(),
            public_key_pem: public.clone(),
            legacy: false,
            active: true,
        });
        (store, public)
    }

    fn cache() -> Arc<dyn Cache> {
        Arc::new(TtlCache::new(CacheConfig::default()).unwrap())
    }

    #[test]
    fn root_key_validation() {
        let store: Arc<dyn WrappedKeyStore> = Arc::new(InMemoryKeyStore::new());
        assert!(matches!(
            BasicManager::new("zz", store.clone()),
            Err(TrustError::RootKeyDecode)
        ));
        assert!(matches!(
            BasicManager::new("00ff", store),
            Err(TrustError::RootKeyLength(2))
        ));
    }

    #[tokio::test]
    async fn unwraps_and_decrypts() {
        let (store, public) = store_with_rsa();
        let cache = cache();
        let manager = BasicManager::new(ROOT, store.clone())
            .unwrap()
            .with_cache(cache.clone(), None);
        let index = StoreKeyIndex::new(store);
        let ctx = RequestContext::new();

        let key = index.find_key_by_algorithm(&ctx, KeyAlgorithm::Rsa2048, false).await.unwrap();
        assert_eq!(key.system, BASIC_SYSTEM);

        let wrapped = RsaEncryptor::from_pem(&public).unwrap().encrypt(&[1u8; 32]).unwrap();
        let dek = manager.decrypt(&ctx, &key, &wrapped, None).await.unwrap();
        assert_eq!(dek.export(None).unwrap(), vec![1u8; 32]);
        assert!(cache.get("opentdf.io/basic::b1").is_some());

        manager.close();
        assert!(cache.get("opentdf.io/basic::b1").is_none());
        assert!(matches!(
            manager.decrypt(&ctx, &key, &wrapped, None).await,
            Err(TrustError::Closed)
        ));
    }

    #[tokio::test]
    async fn wrong_root_key_fails_unwrap() {
        let (store, _) = store_with_rsa();
        let other = "ff".repeat(32);
        let manager = BasicManager::new(&other, store.clone()).unwrap();
        let ctx = RequestContext::new();
        let key = StoreKeyIndex::new(store)
            .find_key_by_id(&ctx, &"b1".into())
            .await
            .unwrap();
        assert!(matches!(
            manager.decrypt(&ctx, &key, b"ct", None).await,
            Err(TrustError::WrappedKeyDecrypt)
        ));
    }

    #[tokio::test]
    async fn corrupt_wrapped_key_fails_decode() {
        let store = Arc::new(InMemoryKeyStore::new());
        store.insert(WrappedKey {
            kid: "b2".into(),
            algorithm: KeyAlgorithm::Rsa2048,
            wrapped: "not base64!".to_string(),
            public_key_pem: String::new(),
            legacy: false,
            active: true,
        });
        let manager = BasicManager::new(ROOT, store.clone()).unwrap();
        let ctx = RequestContext::new();
        let key = StoreKeyIndex::new(store)
            .find_key_by_id(&ctx, &"b2".into())
            .await
            .unwrap();
        assert!(matches!(
            manager.decrypt(&ctx, &key, b"ct", None).await,
            Err(TrustError::WrappedKeyDecode)
        ));
    }

    #[tokio::test]
    async fn unknown_kid_is_not_found() {
        let (store, _) = store_with_rsa();
        let ctx = RequestContext::new();
        let err = StoreKeyIndex::new(store)
            .find_key_by_id(&ctx, &"nope".into())
            .await
            .unwrap_err();
        assert!(matches!(err, TrustError::CertNotFound(_)));
    }
}
