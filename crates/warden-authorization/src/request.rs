//! Request shapes that only the authorization surface uses.

use serde::{Deserialize, Serialize};
use warden_types::{Action, Entity, ResourceAttribute, Token};

/// Like a `DecisionRequest`, but each entity chain is given as a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenDecisionRequest {
    pub actions: Vec<Action>,
    pub tokens: Vec<Token>,
    pub resource_attributes: Vec<ResourceAttribute>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntitlementsRequest {
    pub entities: Vec<Entity>,
    /// Required; limits evaluation to these attribute values.
    pub scope: Option<ResourceAttribute>,
    pub with_comprehensive_hierarchy: Option<bool>,
}
