//! The rewrap orchestrator.
//!
//! One request resolves its entity chain and builds its session
//! encapsulator once, then walks every key access object through
//! [`RewrapState`]. Objects fail independently; only cancellation or a
//! request-level problem (bad client key, unusable token) fails the whole
//! request.

use std::sync::Arc;

use tracing::{debug, info, warn};
use warden_authorization::{AuthorizationService, decide_chain};
use warden_crypto::Encapsulator;
use warden_trust::{DelegatingKeyService, KeyDetails, KeyIndex, ProtectedKey, TrustError};
use warden_types::{DecisionOutcome, EntityChain, ErrorKind, RequestContext};

use crate::error::{KasError, Result};
use crate::policy::{Policy, decode_binding};
use crate::request::{
    FailureReason, KeyAccess, KeyAccessObject, KeyAccessResult, NanoKeyAccess, NanoPolicy,
    RewrapRequest, RewrapResponse, WrappedKeyAccess,
};
use crate::state::{Progress, RewrapState};

/// A key access object that will not be rewrapped, and why.
#[derive(Debug)]
struct Refusal {
    reason: FailureReason,
    error: KasError,
}

fn bad_request(error: impl Into<KasError>) -> Refusal {
    Refusal {
        reason: FailureReason::BadRequest,
        error: error.into(),
    }
}

fn forbidden(error: impl Into<KasError>) -> Refusal {
    Refusal {
        reason: FailureReason::Forbidden,
        error: error.into(),
    }
}

fn internal(error: impl Into<KasError>) -> Refusal {
    Refusal {
        reason: FailureReason::Internal,
        error: error.into(),
    }
}

/// Key lookups and unwraps fail as bad requests unless the trust layer itself
/// is unusable.
fn key_failure(error: TrustError) -> Refusal {
    match error.kind() {
        ErrorKind::CreationFailed
        | ErrorKind::RetrievalFailed
        | ErrorKind::FailedPrecondition
        | ErrorKind::Internal => internal(error),
        _ => bad_request(error),
    }
}

#[derive(Debug, Clone)]
pub struct KeyAccessServer {
    authorization: Arc<AuthorizationService>,
    keys: Arc<DelegatingKeyService>,
}

impl KeyAccessServer {
    pub fn new(authorization: Arc<AuthorizationService>, keys: Arc<DelegatingKeyService>) -> Self {
        Self {
            authorization,
            keys,
        }
    }

    pub fn keys(&self) -> &Arc<DelegatingKeyService> {
        &self.keys
    }

    pub async fn rewrap(
        &self,
        ctx: &RequestContext,
        request: &RewrapRequest,
    ) -> Result<RewrapResponse> {
        info!(
            request_id = %ctx.request_id(),
            key_access_objects = request.key_access_objects.len(),
            "rewrap"
        );
        if request.key_access_objects.is_empty() {
            return Err(KasError::InvalidKeyAccess(
                "request has no key access objects".to_string(),
            ));
        }

        let session = self
            .keys
            .generate_ec_session_key(ctx, &request.client_public_key)
            .await
            .map_err(|e| match e {
                TrustError::Cancelled(c) => KasError::Cancelled(c),
                other => KasError::InvalidClientKey(other.to_string()),
            })?;
        let session_public_key = match session.ephemeral_key() {
            Some(_) => session.public_key_pem().map_err(TrustError::from)?,
            None => String::new(),
        };

        let chain = self
            .authorization
            .ers()
            .create_entity_chain_from_jwt(ctx, &request.token)
            .await?;
        debug!(chain_id = %chain.ephemeral_id, entities = chain.entities.len(), "resolved requester");

        let mut results = Vec::with_capacity(request.key_access_objects.len());
        for kao in &request.key_access_objects {
            let result = match self.rewrap_one(ctx, &chain, kao, session.as_ref()).await {
                Ok(result) => result,
                Err(refusal) if refusal.error.is_cancelled() => return Err(refusal.error),
                Err(Refusal { reason, error }) => {
                    warn!(kao = %kao.id, %reason, error = %error, "key access refused");
                    KeyAccessResult::Fail {
                        id: kao.id.clone(),
                        reason,
                    }
                }
            };
            results.push(result);
        }
        Ok(RewrapResponse {
            session_public_key,
            results,
        })
    }

    async fn rewrap_one(
        &self,
        ctx: &RequestContext,
        chain: &EntityChain,
        kao: &KeyAccessObject,
        session: &dyn Encapsulator,
    ) -> std::result::Result<KeyAccessResult, Refusal> {
        let mut progress = Progress::new(&kao.id);
        let key = self.locate_key(ctx, kao).await?;

        // Nano keys are derived here because an encrypted policy needs them.
        let (policy, derived) = match &kao.access {
            KeyAccess::Wrapped(wrapped) => {
                (Policy::from_base64(&wrapped.policy).map_err(bad_request)?, None)
            }
            KeyAccess::Nano(nano) => {
                let derived = self
                    .keys
                    .derive_key(ctx, &key.id, &nano.ephemeral_public_key, nano.curve)
                    .await
                    .map_err(key_failure)?;
                (nano_policy(nano, &derived)?, Some(derived))
            }
        };
        progress.advance(RewrapState::EntitiesResolved).map_err(internal)?;

        let resource = policy.resource();
        let context = self
            .authorization
            .resource_context(ctx, &resource)
            .await
            .map_err(forbidden)?;
        let entitlements = self
            .authorization
            .chain_entitlements(ctx, chain, &context)
            .await
            .map_err(forbidden)?;
        progress.advance(RewrapState::Entitled).map_err(internal)?;

        let decision = decide_chain(chain, &context, &entitlements).map_err(forbidden)?;
        progress.advance(RewrapState::Decided(decision)).map_err(internal)?;
        if decision != DecisionOutcome::Permit {
            info!(kao = %kao.id, policy = %policy.uuid, "access denied");
            progress.advance(RewrapState::Returned).map_err(internal)?;
            return Ok(KeyAccessResult::Fail {
                id: kao.id.clone(),
                reason: FailureReason::Forbidden,
            });
        }

        let dek = match (&kao.access, derived) {
            (KeyAccess::Wrapped(wrapped), _) => self.unwrap_tdf(ctx, &key, wrapped).await?,
            (KeyAccess::Nano(_), Some(derived)) => derived,
            (KeyAccess::Nano(_), None) => {
                return Err(internal(KasError::InvalidKeyAccess(
                    "nano key was not derived".to_string(),
                )));
            }
        };
        progress.advance(RewrapState::KeyUnwrapped).map_err(internal)?;

        let entity_wrapped_key = dek.export(Some(session)).map_err(key_failure)?;
        progress.advance(RewrapState::KeyRewrapped).map_err(internal)?;

        info!(kao = %kao.id, kid = %key.id, policy = %policy.uuid, "rewrap permitted");
        progress.advance(RewrapState::Returned).map_err(internal)?;
        Ok(KeyAccessResult::Permit {
            id: kao.id.clone(),
            entity_wrapped_key,
        })
    }

    /// The key named by the object, or the preferred key for its algorithm.
    async fn locate_key(
        &self,
        ctx: &RequestContext,
        kao: &KeyAccessObject,
    ) -> std::result::Result<KeyDetails, Refusal> {
        let key = match &kao.kid {
            Some(kid) => self.keys.find_key_by_id(ctx, kid).await,
            None => {
                debug!(kao = %kao.id, algorithm = %kao.algorithm(), "no kid; selecting by algorithm");
                self.keys
                    .find_key_by_algorithm(ctx, kao.algorithm(), true)
                    .await
            }
        }
        .map_err(key_failure)?;

        if kao.algorithm.is_some_and(|alg| alg != key.algorithm) {
            return Err(bad_request(KasError::InvalidKeyAccess(format!(
                "key {} is {}, object asks for {}",
                key.id,
                key.algorithm,
                kao.algorithm()
            ))));
        }
        Ok(key)
    }

    async fn unwrap_tdf(
        &self,
        ctx: &RequestContext,
        key: &KeyDetails,
        wrapped: &WrappedKeyAccess,
    ) -> std::result::Result<ProtectedKey, Refusal> {
        let dek = self
            .keys
            .decrypt(
                ctx,
                &key.id,
                &wrapped.wrapped_key,
                wrapped.ephemeral_public_key.as_deref(),
            )
            .await
            .map_err(key_failure)?;
        let binding = decode_binding(&wrapped.policy_binding).map_err(bad_request)?;
        dek.verify_binding(wrapped.policy.as_bytes(), &binding)
            .map_err(bad_request)?;
        Ok(dek)
    }
}

fn nano_policy(
    nano: &NanoKeyAccess,
    derived: &ProtectedKey,
) -> std::result::Result<Policy, Refusal> {
    match &nano.policy {
        NanoPolicy::Plaintext(json) => Policy::from_json(json).map_err(bad_request),
        NanoPolicy::Encrypted { iv, body, tag_size } => {
            let json = derived
                .decrypt_aes_gcm(iv, body, *tag_size)
                .map_err(bad_request)?;
            Policy::from_json(&json).map_err(bad_request)
        }
    }
}
