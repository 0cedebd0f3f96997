//! Keycloak admin REST client.
//!
//! One [`KeycloakClient`] per service holds the HTTP client and the service
//! account's [`ClientCredentials`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;
use warden_types::RequestContext;

use crate::error::{ErsError, Result};
use crate::idp::{IdentityProvider, IdpGroup, IdpRecord, UserQuery};
use crate::oauth::{ClientCredentials, DEFAULT_TOKEN_BUFFER};

const MEMBERS_PAGE_SIZE: usize = 100;

/// Which identities may be synthesized from the request when the IdP has no record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InferId {
    pub client_id: bool,
    pub email: bool,
    pub username: bool,
}

/// Connection and resolution settings for Keycloak.
#[derive(Clone)]
pub struct KeycloakConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    /// Pre-17 servers serve everything under `/auth`.
    pub legacy_keycloak: bool,
    pub sub_groups: bool,
    pub infer_id: InferId,
    pub token_buffer: Duration,
    pub request_timeout: Duration,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            realm: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            legacy_keycloak: false,
            sub_groups: false,
            infer_id: InferId::default(),
            token_buffer: DEFAULT_TOKEN_BUFFER,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("legacy_keycloak", &self.legacy_keycloak)
            .field("sub_groups", &self.sub_groups)
            .field("infer_id", &self.infer_id)
            .field("token_buffer", &self.token_buffer)
            .finish_non_exhaustive()
    }
}

impl KeycloakConfig {
    fn base(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if self.legacy_keycloak {
            format!("{url}/auth")
        } else {
            url.to_string()
        }
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base(),
            self.realm
        )
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms/{}{path}", self.base(), self.realm)
    }
}

// ============================================================================
// KeycloakClient
// ============================================================================

pub struct KeycloakClient {
    config: KeycloakConfig,
    http: reqwest::Client,
    credentials: ClientCredentials,
}

impl KeycloakClient {
    pub fn new(config: KeycloakConfig) -> Result<Self> {
        if config.legacy_keycloak {
            warn!("using legacy connection mode for Keycloak < 17.x.x");
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ErsError::CreationFailed(format!("http client: {e}")))?;
        let credentials = ClientCredentials::new(
            http.clone(),
            config.token_url(),
            config.client_id.as_str(),
            config.client_secret.as_str(),
        )
        .with_buffer(config.token_buffer);
        Ok(Self {
            config,
            http,
            credentials,
        })
    }

    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let token = self.credentials.token(ctx).await?;
        let url = self.config.admin_url(path);
        let request = async {
            self.http
                .get(&url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await?
                .error_for_status()?
                .json::<T>()
                .await
        };
        ctx.run(request)
            .await?
            .map_err(|e| ErsError::retrieval(path, e))
    }
}

impl fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for KeycloakClient {
    fn realm(&self) -> &str {
        &self.config.realm
    }

    async fn get_clients(&self, ctx: &RequestContext, client_id: &str) -> Result<Vec<IdpRecord>> {
        self.get_json(ctx, "/clients", &[("clientId", client_id)]).await
    }

    async fn get_users(&self, ctx: &RequestContext, query: UserQuery<'_>) -> Result<Vec<IdpRecord>> {
        let field = match query {
            UserQuery::Username(_) => "username",
            UserQuery::Email(_) => "email",
        };
        self.get_json(ctx, "/users", &[(field, query.value()), ("exact", "true")])
            .await
    }

    async fn search_groups(&self, ctx: &RequestContext, search: &str) -> Result<Vec<IdpGroup>> {
        self.get_json(ctx, "/groups", &[("search", search)]).await
    }

    async fn get_group_members(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpRecord>> {
        let path = format!("/groups/{group_id}/members");
        let max = MEMBERS_PAGE_SIZE.to_string();
        let mut members = Vec::new();
        loop {
            let first = members.len().to_string();
            let page: Vec<IdpRecord> = self
                .get_json(ctx, &path, &[("first", first.as_str()), ("max", max.as_str())])
                .await?;
            let last_page = page.len() < MEMBERS_PAGE_SIZE;
            members.extend(page);
            if last_page {
                return Ok(members);
            }
        }
    }

    async fn get_sub_groups(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpGroup>> {
        let path = format!("/groups/{group_id}/children");
        self.get_json(ctx, &path, &[]).await
    }
}
