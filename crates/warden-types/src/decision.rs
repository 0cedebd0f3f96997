//! Decision requests and responses.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::entity::EntityChain;

/// Action requested against a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Decrypt,
    #[default]
    Transmit,
    Custom(String),
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decrypt => f.write_str("DECRYPT"),
            Self::Transmit => f.write_str("TRANSMIT"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Attribute-value FQNs describing one piece of data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceAttribute {
    /// Optional opaque id echoed back in the response.
    pub resource_attributes_id: String,
    pub attribute_value_fqns: Vec<String>,
}

impl ResourceAttribute {
    pub fn new<I, S>(fqns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_attributes_id: String::new(),
            attribute_value_fqns: fqns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.resource_attributes_id = id.into();
        self
    }

    /// The id reported in responses: the explicit id, else the first FQN.
    pub fn response_id(&self) -> String {
        if !self.resource_attributes_id.is_empty() {
            return self.resource_attributes_id.clone();
        }
        self.attribute_value_fqns.first().cloned().unwrap_or_default()
    }
}

/// One batch entry for `GetDecisions`.
///
/// Produces one response per (entity chain, resource attribute) pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecisionRequest {
    pub actions: Vec<Action>,
    pub entity_chains: Vec<EntityChain>,
    pub resource_attributes: Vec<ResourceAttribute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    #[default]
    Unspecified,
    Permit,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecisionResponse {
    pub decision: DecisionOutcome,
    pub entity_chain_id: String,
    pub resource_attributes_id: String,
    pub action: Action,
    pub obligations: Vec<String>,
}

/// Attribute-value FQNs an entity holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityEntitlements {
    pub entity_id: String,
    pub attribute_value_fqns: Vec<String>,
}
