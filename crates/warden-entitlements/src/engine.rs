//! The policy engine seam.
//!
//! The resolver only knows how to build an input document and read a result
//! back. Anything that can evaluate a named decision path against that
//! document can stand behind [`PolicyEngine`].

use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_types::{AttributeAndValue, Entity, RequestContext};

use crate::error::{EntitlementsError, Result};

/// Decision path that yields `{ entity_id: [value_fqn, ...] }`.
pub const ENTITLEMENTS_PATH: &str = "opentdf/entitlements/attributes";

#[async_trait]
pub trait PolicyEngine: Send + Sync + Debug {
    /// Evaluates the decision at `path` against `input`.
    ///
    /// Implementations treat builtin failures as errors rather than undefined
    /// results, and abort when `ctx` is cancelled.
    async fn evaluate(&self, ctx: &RequestContext, path: &str, input: Value) -> Result<Value>;
}

/// Bearer credentials the policy may use to call back into the IdP.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpCredentials {
    pub access_token: String,
}

impl Debug for IdpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpCredentials")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Input document for [`ENTITLEMENTS_PATH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementsInput {
    pub entity: Entity,
    /// Attribute values in scope, with subject mappings, keyed by value FQN.
    #[serde(default)]
    pub attribute_mappings: BTreeMap<String, AttributeAndValue>,
    #[serde(default)]
    pub idp: Option<IdpCredentials>,
}

impl EntitlementsInput {
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| EntitlementsError::Evaluation(format!("encoding policy input: {e}")))
    }

    pub fn from_value(input: Value) -> Result<Self> {
        serde_json::from_value(input)
            .map_err(|e| EntitlementsError::Evaluation(format!("decoding policy input: {e}")))
    }
}

/// Reads the entitlements for `entity_id` out of an evaluation result.
///
/// A missing entry means no entitlements; anything other than an array of
/// strings is rejected.
pub(crate) fn entitlements_for(result: &Value, entity_id: &str) -> Result<Vec<String>> {
    let invalid = |reason: String| EntitlementsError::InvalidResult {
        entity_id: entity_id.to_string(),
        reason,
    };
    let Value::Object(by_entity) = result else {
        return Err(invalid(format!("expected an object, got {result}")));
    };
    let Some(entry) = by_entity.get(entity_id) else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = entry else {
        return Err(invalid(format!("expected an array, got {entry}")));
    };
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(invalid(format!("expected a string, got {other}"))),
        })
        .collect()
}
