//! IdP bearer tokens handed to the policy engine.

use std::fmt::{self, Debug};
use std::time::Duration;

use async_trait::async_trait;
use warden_ers::{ClientCredentials, ErsError};
use warden_types::RequestContext;

use crate::error::{EntitlementsError, Result};

#[async_trait]
pub trait TokenSource: Send + Sync + Debug {
    async fn token(&self, ctx: &RequestContext) -> Result<String>;
}

/// A fixed token, for tests and pre-provisioned credentials.
#[derive(Clone)]
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl Debug for StaticTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticTokenSource([REDACTED])")
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self, ctx: &RequestContext) -> Result<String> {
        ctx.check()?;
        Ok(self.0.clone())
    }
}

// ============================================================================
// ClientCredentialsTokenSource
// ============================================================================

/// OAuth2 client-credentials token source.
///
/// The token is reused until it is within `buffer` of expiry; refreshes are
/// serialized so concurrent callers trigger a single login.
pub struct ClientCredentialsTokenSource {
    credentials: ClientCredentials,
}

impl ClientCredentialsTokenSource {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EntitlementsError::Token(format!("http client: {e}")))?;
        Ok(Self {
            credentials: ClientCredentials::new(http, token_url, client_id, client_secret),
        })
    }

    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.credentials = self.credentials.with_buffer(buffer);
        self
    }
}

impl Debug for ClientCredentialsTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientCredentialsTokenSource")
            .field(&self.credentials)
            .finish()
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsTokenSource {
    async fn token(&self, ctx: &RequestContext) -> Result<String> {
        self.credentials.token(ctx).await.map_err(|e| match e {
            ErsError::Cancelled(c) => EntitlementsError::Cancelled(c),
            other => EntitlementsError::Token(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use warden_types::ErrorKind;

    use super::*;

    /// Answers every connection with one canned response and counts logins.
    async fn token_endpoint(status: u16, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/token", listener.local_addr().unwrap());
        let logins = Arc::new(AtomicUsize::new(0));
        let counter = logins.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut chunk = [0_u8; 4096];
                // The form body is small enough to arrive with the headers or right after.
                while let Ok(n) = stream.read(&mut chunk).await {
                    request.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&request);
                    if n == 0 || text.contains("grant_type=client_credentials") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (url, logins)
    }

    #[tokio::test]
    async fn static_source_returns_token() {
        let source = StaticTokenSource::new("abc");
        assert_eq!(source.token(&RequestContext::new()).await.unwrap(), "abc");
        assert!(!format!("{source:?}").contains("abc"));
    }

    #[tokio::test]
    async fn one_login_serves_calls_within_lifetime() {
        let (url, logins) =
            token_endpoint(200, r#"{"access_token":"idp-token","expires_in":300}"#).await;
        let source = ClientCredentialsTokenSource::new(url, "svc", "secret").unwrap();
        let ctx = RequestContext::new();

        assert_eq!(source.token(&ctx).await.unwrap(), "idp-token");
        assert_eq!(source.token(&ctx).await.unwrap(), "idp-token");
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_lived_token_is_refreshed() {
        let (url, logins) =
            token_endpoint(200, r#"{"access_token":"idp-token","expires_in":30}"#).await;
        let source = ClientCredentialsTokenSource::new(url, "svc", "secret")
            .unwrap()
            .with_buffer(Duration::from_secs(60));
        let ctx = RequestContext::new();

        source.token(&ctx).await.unwrap();
        source.token(&ctx).await.unwrap();
        assert_eq!(logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_login_is_retrieval_failure() {
        let (url, _) = token_endpoint(401, r#"{"error":"invalid_client"}"#).await;
        let source = ClientCredentialsTokenSource::new(url, "svc", "secret").unwrap();

        let err = source.token(&RequestContext::new()).await.unwrap_err();
        assert!(matches!(err, EntitlementsError::Token(_)), "{err:?}");
        assert_eq!(err.kind(), ErrorKind::RetrievalFailed);
    }

    #[tokio::test]
    async fn cancelled_context_skips_login() {
        let source =
            ClientCredentialsTokenSource::new("http://127.0.0.1:9/token", "svc", "secret").unwrap();
        let ctx = RequestContext::new();
        ctx.cancel();
        let err = source.token(&ctx).await.unwrap_err();
        assert!(matches!(err, EntitlementsError::Cancelled(_)));
        assert!(!format!("{source:?}").contains("\"secret\""));
    }
}
