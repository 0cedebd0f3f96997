//! The identity provider seam and its write-through cache.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use warden_cache::{Cache, json_cost};
use warden_types::RequestContext;

use crate::error::Result;

/// A user or client record as the IdP returns it.
pub type IdpRecord = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IdpGroup {
    pub id: String,
    pub name: String,
    pub path: String,
}

/// Exact-match user lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserQuery<'a> {
    Username(&'a str),
    Email(&'a str),
}

impl UserQuery<'_> {
    pub fn value(&self) -> &str {
        match self {
            Self::Username(v) | Self::Email(v) => v,
        }
    }
}

/// Read access to an identity provider's clients, users and groups.
///
/// Every call honours the request context; implementations abort in-flight
/// I/O when it is cancelled.
#[async_trait]
pub trait IdentityProvider: Send + Sync + Debug {
    /// Realm the provider serves; used to scope cache keys.
    fn realm(&self) -> &str;

    async fn get_clients(&self, ctx: &RequestContext, client_id: &str) -> Result<Vec<IdpRecord>>;

    async fn get_users(&self, ctx: &RequestContext, query: UserQuery<'_>) -> Result<Vec<IdpRecord>>;

    async fn search_groups(&self, ctx: &RequestContext, search: &str) -> Result<Vec<IdpGroup>>;

    async fn get_group_members(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpRecord>>;

    /// Direct children of a group.
    async fn get_sub_groups(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpGroup>>;
}

// ============================================================================
// CachedIdentityProvider
// ============================================================================

/// Write-through cache in front of an [`IdentityProvider`].
///
/// Keys are `<realm>::client::<id>`, `<realm>::user::<kind>:<value>`,
/// `<realm>::group::<search>`, `<realm>::group::<id>::members` and
/// `<realm>::group::<id>::children`. Only successful upstream results are
/// stored.
#[derive(Debug, Clone)]
pub struct CachedIdentityProvider {
    inner: Arc<dyn IdentityProvider>,
    cache: Arc<dyn Cache>,
}

impl CachedIdentityProvider {
    pub fn new(inner: Arc<dyn IdentityProvider>, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }

    fn key(&self, kind: &str, id: &str) -> String {
        format!("{}::{kind}::{id}", self.inner.realm())
    }

    async fn through<T, F>(&self, key: String, fetch: F) -> Result<T>
    where
        T: Clone + Serialize + Send + Sync + 'static,
        F: Future<Output = Result<T>> + Send,
    {
        if let Some(hit) = self.cache.get_as::<T>(&key) {
            debug!(key, "idp cache hit");
            return Ok(T::clone(&hit));
        }
        let value = fetch.await?;
        if !self.cache.set_as(&key, value.clone(), json_cost(&value)) {
            debug!(key, "idp cache rejected entry");
        }
        Ok(value)
    }
}

#[async_trait]
impl IdentityProvider for CachedIdentityProvider {
    fn realm(&self) -> &str {
        self.inner.realm()
    }

    async fn get_clients(&self, ctx: &RequestContext, client_id: &str) -> Result<Vec<IdpRecord>> {
        let key = self.key("client", client_id);
        self.through(key, self.inner.get_clients(ctx, client_id)).await
    }

    async fn get_users(&self, ctx: &RequestContext, query: UserQuery<'_>) -> Result<Vec<IdpRecord>> {
        let id = match query {
            UserQuery::Username(v) => format!("username:{v}"),
            UserQuery::Email(v) => format!("email:{v}"),
        };
        let key = self.key("user", &id);
        self.through(key, self.inner.get_users(ctx, query)).await
    }

    async fn search_groups(&self, ctx: &RequestContext, search: &str) -> Result<Vec<IdpGroup>> {
        let key = self.key("group", search);
        self.through(key, self.inner.search_groups(ctx, search)).await
    }

    async fn get_group_members(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpRecord>> {
        let key = format!("{}::members", self.key("group", group_id));
        self.through(key, self.inner.get_group_members(ctx, group_id)).await
    }

    async fn get_sub_groups(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpGroup>> {
        let key = format!("{}::children", self.key("group", group_id));
        self.through(key, self.inner.get_sub_groups(ctx, group_id)).await
    }
}
