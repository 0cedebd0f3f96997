//! The two seams of the trust layer: locating keys and using them.

use std::fmt::Debug;

use async_trait::async_trait;
use warden_crypto::Encapsulator;
use warden_types::{EcCurve, KeyAlgorithm, KeyIdentifier, RequestContext};

use crate::error::Result;
use crate::key::{KeyDetails, ProtectedKey};

/// Filters for [`KeyIndex::list_keys_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListKeyOptions {
    pub legacy_only: bool,
}

/// Locates wrapping keys by algorithm or id.
///
/// Lookups that match nothing fail with [`TrustError::CertNotFound`](crate::TrustError::CertNotFound).
#[async_trait]
pub trait KeyIndex: Send + Sync + Debug {
    /// Finds a key for wrapping new data with `algorithm`.
    ///
    /// Legacy keys are only considered when `include_legacy` is set, and then
    /// only after every non-legacy candidate.
    async fn find_key_by_algorithm(
        &self,
        ctx: &RequestContext,
        algorithm: KeyAlgorithm,
        include_legacy: bool,
    ) -> Result<KeyDetails>;

    async fn find_key_by_id(&self, ctx: &RequestContext, id: &KeyIdentifier) -> Result<KeyDetails>;

    async fn list_keys(&self, ctx: &RequestContext) -> Result<Vec<KeyDetails>> {
        self.list_keys_with(ctx, ListKeyOptions::default()).await
    }

    async fn list_keys_with(&self, ctx: &RequestContext, opts: ListKeyOptions) -> Result<Vec<KeyDetails>>;
}

/// Performs private-key operations inside the trust boundary.
///
/// Results are [`ProtectedKey`]s; raw key bytes never cross this interface.
#[async_trait]
pub trait KeyManager: Send + Sync + Debug {
    /// System name matched against [`KeyDetails::system`].
    fn name(&self) -> &str;

    /// Unwraps a DEK wrapped under `key`.
    ///
    /// RSA keys use OAEP and ignore `ephemeral_public_key`. EC keys require it
    /// and unwrap with ECDH, HKDF and AES-GCM.
    async fn decrypt(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        ciphertext: &[u8],
        ephemeral_public_key: Option<&[u8]>,
    ) -> Result<ProtectedKey>;

    /// Derives a NanoTDF symmetric key from the client's ephemeral point.
    async fn derive_key(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        ephemeral_public_key: &[u8],
        curve: EcCurve,
    ) -> Result<ProtectedKey>;

    /// Builds an encapsulator that wraps for the client's ephemeral public key.
    async fn generate_ec_session_key(
        &self,
        ctx: &RequestContext,
        ephemeral_public_key_pem: &str,
    ) -> Result<Box<dyn Encapsulator>>;

    /// Releases cached private-key material.
    fn close(&self);
}
