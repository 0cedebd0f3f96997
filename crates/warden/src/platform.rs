//! Assembles the services from a [`WardenConfig`].

use std::sync::Arc;

use anyhow::{Context, Result, bail, ensure};
use tracing::{info, warn};
use warden_authorization::AuthorizationService;
use warden_cache::{Cache, TtlCache};
use warden_config::{ErsMode, WardenConfig};
use warden_entitlements::{
    AttributeStore, ClientCredentialsTokenSource, EntitlementsResolver, InMemoryAttributeStore,
    SubjectMappingEngine,
};
use warden_ers::{
    CachedIdentityProvider, ClaimsResolver, EntityResolver, IdentityProvider, IdpResolver,
    IdpResolverOptions, InferId, KeycloakClient, KeycloakConfig,
};
use warden_kas::KeyAccessServer;
use warden_trust::{
    BASIC_SYSTEM, BasicManager, DelegatingKeyService, IN_PROCESS_SYSTEM, InProcessProvider,
    KeyIndex, KeyManager, KeyManagerFactory, KeyManagerFactoryOptions, StoreKeyIndex,
    WrappedKeyStore,
};

use crate::keyring::load_keyring;

/// Everything a deployment serves, wired from one configuration.
///
/// ```text
/// WardenConfig
///   ├─ cache ──────────► TtlCache ─────────┬──────────────┐
///   ├─ ers/idp ────────► EntityResolver ◄──┤ (keycloak)   │
///   ├─ entitlements ───► EntitlementsResolver             │
///   │                        └─► AuthorizationService     │
///   └─ kas ────────────► DelegatingKeyService ◄───────────┘
///                            └─► KeyAccessServer
/// ```
pub struct Platform {
    cache: Option<Arc<dyn Cache>>,
    authorization: Arc<AuthorizationService>,
    keys: Arc<DelegatingKeyService>,
    kas: KeyAccessServer,
}

impl Platform {
    pub fn builder(config: &WardenConfig) -> PlatformBuilder<'_> {
        PlatformBuilder {
            config,
            attributes: None,
            wrapped_keys: None,
        }
    }

    /// Builds a platform with an empty attribute store and the configured
    /// keyring.
    pub async fn from_config(config: &WardenConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    pub fn ers(&self) -> &Arc<dyn EntityResolver> {
        self.authorization.ers()
    }

    pub fn authorization(&self) -> &Arc<AuthorizationService> {
        &self.authorization
    }

    pub fn keys(&self) -> &Arc<DelegatingKeyService> {
        &self.keys
    }

    pub fn kas(&self) -> &KeyAccessServer {
        &self.kas
    }

    /// Drops cached key managers and the private material they hold.
    pub async fn shutdown(&self) {
        self.keys.close().await;
        info!("platform shut down");
    }
}

/// Supplies the collaborators configuration cannot describe.
pub struct PlatformBuilder<'a> {
    config: &'a WardenConfig,
    attributes: Option<Arc<dyn AttributeStore>>,
    wrapped_keys: Option<Arc<dyn WrappedKeyStore>>,
}

impl PlatformBuilder<'_> {
    /// Source of attribute definitions and subject mappings.
    pub fn with_attribute_store(mut self, store: Arc<dyn AttributeStore>) -> Self {
        self.attributes = Some(store);
        self
    }

    /// Keys wrapped under `kas.root_key`. Replaces the in-process keyring as
    /// the key index, so `kas.keyring` must be empty.
    pub fn with_wrapped_key_store(mut self, store: Arc<dyn WrappedKeyStore>) -> Self {
        self.wrapped_keys = Some(store);
        self
    }

    pub async fn build(self) -> Result<Platform> {
        let config = self.config;
        config.validate()?;

        let cache = build_cache(config)?;
        let ers = build_ers(config, cache.as_ref())?;

        let attributes: Arc<dyn AttributeStore> = match self.attributes {
            Some(store) => store,
            None => {
                warn!("no attribute store supplied; every resource lookup will fail");
                Arc::new(InMemoryAttributeStore::new([])?)
            }
        };
        let mut entitlements =
            EntitlementsResolver::new(attributes, Arc::new(SubjectMappingEngine::new(ers.clone())));
        if config.entitlements.send_idp_token {
            let idp = keycloak_config(config);
            let tokens = ClientCredentialsTokenSource::new(
                idp.token_url(),
                idp.client_id.as_str(),
                idp.client_secret.as_str(),
            )?
            .with_buffer(idp.token_buffer);
            entitlements = entitlements.with_token_source(Arc::new(tokens));
        }
        let authorization = Arc::new(
            AuthorizationService::new(ers, entitlements)
                .with_comprehensive_hierarchy(config.entitlements.comprehensive_hierarchy),
        );

        let keys = Arc::new(build_key_service(config, cache.as_ref(), self.wrapped_keys).await?);
        let kas = KeyAccessServer::new(authorization.clone(), keys.clone());

        info!(
            ers = ?config.ers.mode,
            cache = cache.is_some(),
            default_manager = %config.kas.default_manager,
            "platform ready"
        );
        Ok(Platform {
            cache,
            authorization,
            keys,
            kas,
        })
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn build_cache(config: &WardenConfig) -> Result<Option<Arc<dyn Cache>>> {
    if !config.cache.enabled {
        return Ok(None);
    }
    let cache: Arc<dyn Cache> = Arc::new(
        TtlCache::new(warden_cache::CacheConfig {
            max_cost: config.cache.max_cost.bytes(),
            default_ttl: config.cache.expiration(),
            shards: config.cache.shards,
        })
        .context("building cache")?,
    );
    Ok(Some(cache))
}

fn keycloak_config(config: &WardenConfig) -> KeycloakConfig {
    let idp = &config.idp;
    KeycloakConfig {
        url: idp.url.clone(),
        realm: idp.realm.clone(),
        client_id: idp.client_id.clone(),
        client_secret: idp.client_secret.clone(),
        legacy_keycloak: idp.legacy_keycloak,
        sub_groups: idp.sub_groups,
        infer_id: InferId {
            client_id: idp.infer_id.client_id,
            email: idp.infer_id.email,
            username: idp.infer_id.username,
        },
        token_buffer: idp.token_buffer(),
        request_timeout: idp.request_timeout(),
    }
}

fn build_ers(
    config: &WardenConfig,
    cache: Option<&Arc<dyn Cache>>,
) -> Result<Arc<dyn EntityResolver>> {
    match config.ers.mode {
        ErsMode::Claims => Ok(Arc::new(ClaimsResolver::new())),
        ErsMode::Keycloak => {
            let keycloak = keycloak_config(config);
            let options = IdpResolverOptions {
                infer_id: keycloak.infer_id,
                sub_groups: keycloak.sub_groups,
            };
            let mut idp: Arc<dyn IdentityProvider> = Arc::new(KeycloakClient::new(keycloak)?);
            if let Some(cache) = cache {
                idp = Arc::new(CachedIdentityProvider::new(idp, cache.clone()));
            }
            Ok(Arc::new(IdpResolver::new(idp).with_options(options)))
        }
    }
}

async fn build_key_service(
    config: &WardenConfig,
    cache: Option<&Arc<dyn Cache>>,
    wrapped_keys: Option<Arc<dyn WrappedKeyStore>>,
) -> Result<DelegatingKeyService> {
    let kas = &config.kas;
    let mut factories: Vec<(&str, KeyManagerFactory)> = Vec::new();

    let index: Arc<dyn KeyIndex> = if let Some(store) = wrapped_keys {
        ensure!(
            kas.keyring.is_empty(),
            "kas.keyring cannot be combined with a wrapped key store"
        );
        if kas.root_key.is_empty() {
            bail!("a wrapped key store needs kas.root_key");
        }
        // Fail on a bad root key now rather than on the first rewrap.
        BasicManager::new(&kas.root_key, store.clone()).context("kas.root_key")?;
        let root_key = kas.root_key.clone();
        let ttl = config.cache.expiration();
        let factory_store = store.clone();
        let factory: KeyManagerFactory = Arc::new(
            move |opts: &KeyManagerFactoryOptions| -> warden_trust::Result<Arc<dyn KeyManager>> {
                let mut manager = BasicManager::new(&root_key, factory_store.clone())?;
                if let Some(cache) = &opts.cache {
                    manager = manager.with_cache(cache.clone(), ttl);
                }
                Ok(Arc::new(manager))
            },
        );
        factories.push((BASIC_SYSTEM, factory));
        Arc::new(StoreKeyIndex::new(store))
    } else {
        if !kas.root_key.is_empty() {
            warn!("kas.root_key is set but no wrapped key store was supplied; ignoring it");
        }
        let provider = Arc::new(InProcessProvider::new(load_keyring(&kas.keyring)?)?);
        let manager = provider.clone();
        let factory: KeyManagerFactory = Arc::new(
            move |_opts: &KeyManagerFactoryOptions| -> warden_trust::Result<Arc<dyn KeyManager>> {
                Ok(manager.clone())
            },
        );
        factories.push((IN_PROCESS_SYSTEM, factory));
        provider
    };

    if !factories.iter().any(|(name, _)| *name == kas.default_manager) {
        bail!(
            "kas.default_manager '{}' is not available; expected one of: {}",
            kas.default_manager,
            factories
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let mut service = DelegatingKeyService::new(index);
    if let Some(cache) = cache {
        service = service.with_cache(cache.clone());
    }
    for (name, factory) in factories {
        service.register_factory(name, factory).await;
    }
    service.set_default_mode(kas.default_manager.as_str()).await;
    Ok(service)
}
