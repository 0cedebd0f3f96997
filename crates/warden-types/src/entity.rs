//! Entities: the principals a decision is made about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role an entity plays in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityCategory {
    #[default]
    Unspecified,
    Subject,
    Environment,
}

/// The identifying payload of an entity.
///
/// Serializes externally tagged, so a client id becomes `{"clientId": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    ClientId(String),
    UserName(String),
    EmailAddress(String),
    /// Opaque structured claims, passed through unchanged.
    Claims(Value),
}

impl EntityKind {
    /// Short lowercase tag used when composing ephemeral ids.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ClientId(_) => "clientid",
            Self::UserName(_) => "username",
            Self::EmailAddress(_) => "emailaddress",
            Self::Claims(_) => "claims",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Request-scoped id. Empty until assigned.
    #[serde(default, rename = "id")]
    pub ephemeral_id: String,
    #[serde(default)]
    pub category: EntityCategory,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(kind: EntityKind, category: EntityCategory) -> Self {
        Self {
            ephemeral_id: String::new(),
            category,
            kind,
        }
    }

    pub fn client_id(id: impl Into<String>) -> Self {
        Self::new(EntityKind::ClientId(id.into()), EntityCategory::Subject)
    }

    pub fn user_name(name: impl Into<String>) -> Self {
        Self::new(EntityKind::UserName(name.into()), EntityCategory::Subject)
    }

    pub fn email(address: impl Into<String>) -> Self {
        Self::new(EntityKind::EmailAddress(address.into()), EntityCategory::Subject)
    }

    pub fn claims(claims: Value) -> Self {
        Self::new(EntityKind::Claims(claims), EntityCategory::Subject)
    }

    pub fn with_ephemeral_id(mut self, id: impl Into<String>) -> Self {
        self.ephemeral_id = id.into();
        self
    }

    pub fn with_category(mut self, category: EntityCategory) -> Self {
        self.category = category;
        self
    }

    /// Structured-map form of the entity, as handed to policy evaluation.
    pub fn to_structured(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Assigns `jwtentity-<index>` to every entity without an ephemeral id.
pub fn assign_ephemeral_ids(entities: &mut [Entity]) {
    for (idx, entity) in entities.iter_mut().enumerate() {
        if entity.ephemeral_id.is_empty() {
            entity.ephemeral_id = format!("jwtentity-{idx}");
        }
    }
}

/// Ordered entities derived from a single token.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityChain {
    #[serde(rename = "id")]
    pub ephemeral_id: String,
    pub entities: Vec<Entity>,
}

/// IdP records resolved for one input entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityRepresentation {
    pub original_id: String,
    pub additional_props: Vec<Map<String, Value>>,
}

/// A raw bearer token with a caller-chosen id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub jwt: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_form_is_tagged() {
        let entity = Entity::email("alice@example.org").with_ephemeral_id("e1");
        let map = entity.to_structured();
        assert_eq!(map.get("emailAddress"), Some(&json!("alice@example.org")));
        assert_eq!(map.get("id"), Some(&json!("e1")));
        assert_eq!(map.get("category"), Some(&json!("SUBJECT")));
    }

    #[test]
    fn deserialize_round_trips_kind() {
        let entity: Entity =
            serde_json::from_value(json!({"id": "x", "clientId": "svc", "category": "ENVIRONMENT"}))
                .unwrap();
        assert_eq!(entity.kind, EntityKind::ClientId("svc".to_string()));
        assert_eq!(entity.category, EntityCategory::Environment);
    }

    #[test]
    fn ephemeral_ids_assigned_by_position() {
        let mut entities = vec![
            Entity::client_id("a"),
            Entity::user_name("b").with_ephemeral_id("keep"),
            Entity::email("c@d.e"),
        ];
        assign_ephemeral_ids(&mut entities);
        let ids: Vec<_> = entities.iter().map(|e| e.ephemeral_id.as_str()).collect();
        assert_eq!(ids, ["jwtentity-0", "keep", "jwtentity-2"]);
    }
}
