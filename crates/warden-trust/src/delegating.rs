//! Routes key operations to the manager that owns each key.
//!
//! Managers are built lazily from factories registered by name. A key whose
//! `system` has no factory falls back to the default manager.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use warden_cache::Cache;
use warden_crypto::Encapsulator;
use warden_types::{EcCurve, KeyAlgorithm, KeyIdentifier, RequestContext};

use crate::error::{Result, TrustError};
use crate::key::{KeyDetails, ProtectedKey};
use crate::service::{KeyIndex, KeyManager, ListKeyOptions};

/// What a factory receives when asked to build its manager.
#[derive(Debug, Clone)]
pub struct KeyManagerFactoryOptions {
    pub name: String,
    pub cache: Option<Arc<dyn Cache>>,
}

/// Builds a [`KeyManager`]. Called at most once per name until the service closes.
pub type KeyManagerFactory =
    Arc<dyn Fn(&KeyManagerFactoryOptions) -> Result<Arc<dyn KeyManager>> + Send + Sync>;

#[derive(Default)]
struct Registry {
    factories: HashMap<String, KeyManagerFactory>,
    managers: HashMap<String, Arc<dyn KeyManager>>,
    default_mode: Option<String>,
    default_manager: Option<Arc<dyn KeyManager>>,
}

impl Registry {
    /// Returns the cached manager for `name`, building it if a factory exists.
    fn load(&mut self, name: &str, cache: &Option<Arc<dyn Cache>>) -> Result<Option<Arc<dyn KeyManager>>> {
        if let Some(manager) = self.managers.get(name) {
            return Ok(Some(manager.clone()));
        }
        let Some(factory) = self.factories.get(name) else {
            return Ok(None);
        };
        let opts = KeyManagerFactoryOptions {
            name: name.to_string(),
            cache: cache.clone(),
        };
        let manager = factory(&opts).map_err(|e| TrustError::Factory {
            name: name.to_string(),
            source: Box::new(e),
        })?;
        info!(manager = name, "key manager created");
        self.managers.insert(name.to_string(), manager.clone());
        Ok(Some(manager))
    }

    fn default_manager(&mut self, cache: &Option<Arc<dyn Cache>>) -> Result<Arc<dyn KeyManager>> {
        if let Some(manager) = &self.default_manager {
            return Ok(manager.clone());
        }
        let mode = self.default_mode.clone().ok_or(TrustError::NoDefaultManager)?;
        let manager = self.load(&mode, cache)?.ok_or(TrustError::NoDefaultManager)?;
        self.default_manager = Some(manager.clone());
        Ok(manager)
    }

    fn resolve(&mut self, system: &str, cache: &Option<Arc<dyn Cache>>) -> Result<Arc<dyn KeyManager>> {
        if let Some(manager) = self.load(system, cache)? {
            return Ok(manager);
        }
        warn!(system, "no key manager registered for system, using default");
        self.default_manager(cache)
    }
}

// ============================================================================
// DelegatingKeyService
// ============================================================================

/// Front door of the trust layer.
///
/// Lookups go to the [`KeyIndex`]; private-key operations go to the manager
/// named by the key's `system`.
pub struct DelegatingKeyService {
    index: Arc<dyn KeyIndex>,
    cache: Option<Arc<dyn Cache>>,
    registry: Mutex<Registry>,
}

impl DelegatingKeyService {
    pub fn new(index: Arc<dyn KeyIndex>) -> Self {
        Self {
            index,
            cache: None,
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Cache handed to every factory.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Registers `factory` under `name`, replacing any earlier registration.
    pub async fn register_factory(&self, name: impl Into<String>, factory: KeyManagerFactory) {
        let name = name.into();
        let mut registry = self.registry.lock().await;
        if registry.factories.insert(name.clone(), factory).is_some() {
            warn!(manager = %name, "replacing key manager factory");
        }
    }

    /// Names the manager used for keys whose system has no factory.
    pub async fn set_default_mode(&self, name: impl Into<String>) {
        let mut registry = self.registry.lock().await;
        registry.default_mode = Some(name.into());
        registry.default_manager = None;
    }

    async fn manager_for(&self, system: &str) -> Result<Arc<dyn KeyManager>> {
        self.registry.lock().await.resolve(system, &self.cache)
    }

    pub async fn decrypt(
        &self,
        ctx: &RequestContext,
        kid: &KeyIdentifier,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey> {
        let key = self.index.find_key_by_id(ctx, kid).await?;
        let manager = self.manager_for(&key.system).await?;
        manager.decrypt(ctx, &key, ciphertext, ephemeral_public_key).await
    }

    pub async fn derive_key(
        &self,
        ctx: &RequestContext,
        kid: &KeyIdentifier,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
    ) -> Result<ProtectedKey> {
        let key = self.index.find_key_by_id(ctx, kid).await?;
        let manager = self.manager_for(&key.system).await?;
        manager.derive_key(ctx, &key, ephemeral_public_key, curve).await
    }

    /// Session keys are not tied to a stored key, so the default manager builds them.
    pub async fn generate_ec_session_key(
        &self,
        ctx: &RequestContext,
        ephemeral_public_key_pem: &str,
    ) -> Result<Box<dyn Encapsulator>> {
        let manager = self.registry.lock().await.default_manager(&self.cache)?;
        manager.generate_ec_session_key(ctx, ephemeral_public_key_pem).await
    }

    /// Closes every manager built so far. Factories stay registered, so later
    /// calls rebuild managers on demand.
    pub async fn close(&self) {
        let mut registry = self.registry.lock().await;
        let managers: Vec<_> = registry.managers.drain().collect();
        for (name, manager) in &managers {
            debug!(manager = %name, "closing key manager");
            manager.close();
        }
        if let Some(default) = registry.default_manager.take() {
            if !managers.iter().any(|(_, m)| Arc::ptr_eq(m, &default)) {
                default.close();
            }
        }
    }
}

impl fmt::Debug for DelegatingKeyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatingKeyService")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyIndex for DelegatingKeyService {
    async fn find_key_by_algorithm(
        &self,
        ctx: &RequestContext,
        algorithm: KeyAlgorithm,
        include_legacy: bool,
    ) -> Result<KeyDetails> {
        self.index.find_key_by_algorithm(ctx, algorithm, include_legacy).await
    }

    async fn find_key_by_id(&self, ctx: &RequestContext, id: &KeyIdentifier) -> Result<KeyDetails> {
        self.index.find_key_by_id(ctx, id).await
    }

    async fn list_keys_with(&self, ctx: &RequestContext, opts: ListKeyOptions) -> Result<Vec<KeyDetails>> {
        self.index.list_keys_with(ctx, opts).await
    }
}
