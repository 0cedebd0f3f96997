//! OAuth2 client-credentials login with a cached access token.
//!
//! The token is reused until it is within the refresh buffer of expiry.
//! Refreshes happen under a mutex, so concurrent callers trigger a single
//! login.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, error};
use warden_types::RequestContext;

use crate::error::{ErsError, Result};

/// Default refresh window before token expiry.
pub const DEFAULT_TOKEN_BUFFER: Duration = Duration::from_secs(120);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    /// `None` when the lifetime runs past the end of the clock's range.
    expires_at: Option<Instant>,
}

impl AccessToken {
    fn issued(value: String, now: Instant, expires_in: u64) -> Self {
        Self {
            value,
            expires_at: now.checked_add(Duration::from_secs(expires_in)),
        }
    }

    /// A token is usable until `buffer` before it expires.
    fn is_fresh(&self, now: Instant, buffer: Duration) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => expires_at
                .checked_sub(buffer)
                .is_some_and(|refresh_at| now < refresh_at),
        }
    }
}

pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    buffer: Duration,
    token: Mutex<Option<AccessToken>>,
}

impl ClientCredentials {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            buffer: DEFAULT_TOKEN_BUFFER,
            token: Mutex::new(None),
        }
    }

    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns the cached access token, logging in again when it is about to
    /// expire. Login failures are `CreationFailed`.
    pub async fn token(&self, ctx: &RequestContext) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.is_fresh(Instant::now(), self.buffer) {
                return Ok(token.value.clone());
            }
        }

        let response = self.login(ctx).await?;
        debug!(
            token_url = %self.token_url,
            expires_in = response.expires_in,
            "refreshed access token"
        );
        let token = AccessToken::issued(response.access_token, Instant::now(), response.expires_in);
        let value = token.value.clone();
        *guard = Some(token);
        Ok(value)
    }

    async fn login(&self, ctx: &RequestContext) -> Result<TokenResponse> {
        let request = async {
            self.http
                .post(&self.token_url)
                .form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json::<TokenResponse>()
                .await
        };
        ctx.run(request).await?.map_err(|e| {
            error!(error = %e, token_url = %self.token_url, "client credentials login failed");
            ErsError::CreationFailed(format!("login: {e}"))
        })
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
