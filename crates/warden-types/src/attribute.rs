//! Attribute definitions and values as returned by the policy store.

use serde::{Deserialize, Serialize};

use crate::fqn::{self, FqnError};
use crate::subject_mapping::SubjectMapping;

/// How the values of an attribute definition combine during a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeRule {
    #[default]
    Unspecified,
    AllOf,
    AnyOf,
    /// Values are rank-ordered; index 0 is the highest rank.
    Hierarchy,
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeValue {
    pub id: String,
    pub value: String,
    /// Value FQN; may be empty when the store did not populate it.
    pub fqn: String,
    pub subject_mappings: Vec<SubjectMapping>,
}

impl AttributeValue {
    /// Creates a value identified only by its FQN.
    pub fn from_fqn(fqn: impl Into<String>) -> Self {
        Self {
            fqn: fqn.into(),
            ..Self::default()
        }
    }
}

/// An attribute definition: namespace, name, rule and ordered values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeDefinition {
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub rule: AttributeRule,
    pub values: Vec<AttributeValue>,
    /// Definition FQN; may be empty when the store did not populate it.
    pub fqn: String,
}

impl AttributeDefinition {
    /// Returns the definition FQN, building it from namespace and name when absent.
    pub fn definition_fqn(&self) -> Result<String, FqnError> {
        if self.fqn.is_empty() {
            fqn::build_fqn(&self.namespace, &self.name, "")
        } else {
            Ok(fqn::canonicalize(&self.fqn))
        }
    }

    /// Fills in every missing FQN on the definition and its values.
    pub fn populate_fqns(&mut self) -> Result<(), FqnError> {
        if self.fqn.is_empty() {
            self.fqn = fqn::build_fqn(&self.namespace, &self.name, "")?;
        }
        for value in &mut self.values {
            if value.fqn.is_empty() {
                value.fqn = fqn::build_fqn(&self.namespace, &self.name, &value.value)?;
            }
        }
        Ok(())
    }

    /// Canonical value FQNs in definition order.
    pub fn value_fqns(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| fqn::canonicalize(&v.fqn))
            .collect()
    }

    /// Rank of a value FQN within the ordered values, compared case-insensitively.
    pub fn rank_of(&self, value_fqn: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.fqn.eq_ignore_ascii_case(value_fqn))
    }
}

/// A value together with the definition it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttributeAndValue {
    pub attribute: AttributeDefinition,
    pub value: AttributeValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification() -> AttributeDefinition {
        AttributeDefinition {
            namespace: "example.org".to_string(),
            name: "classification".to_string(),
            rule: AttributeRule::Hierarchy,
            values: ["top", "mid", "low"]
                .iter()
                .map(|v| AttributeValue {
                    value: (*v).to_string(),
                    ..AttributeValue::default()
                })
                .collect(),
            ..AttributeDefinition::default()
        }
    }

    #[test]
    fn populate_fills_missing_fqns() {
        let mut def = classification();
        def.values[1].fqn = "https://example.org/attr/classification/value/MID".to_string();
        def.populate_fqns().unwrap();

        assert_eq!(def.fqn, "https://example.org/attr/classification");
        assert_eq!(
            def.values[0].fqn,
            "https://example.org/attr/classification/value/top"
        );
        // Existing FQNs are left alone.
        assert_eq!(
            def.values[1].fqn,
            "https://example.org/attr/classification/value/MID"
        );
    }

    #[test]
    fn populate_requires_namespace() {
        let mut def = classification();
        def.namespace.clear();
        assert_eq!(def.populate_fqns(), Err(FqnError::MissingNamespace));
    }

    #[test]
    fn rank_is_case_insensitive() {
        let mut def = classification();
        def.populate_fqns().unwrap();
        assert_eq!(
            def.rank_of("https://example.org/attr/classification/value/LOW"),
            Some(2)
        );
        assert_eq!(
            def.rank_of("https://example.org/attr/classification/value/none"),
            None
        );
    }

    #[test]
    fn rule_serializes_screaming_case() {
        let json = serde_json::to_string(&AttributeRule::AnyOf).unwrap();
        assert_eq!(json, "\"ANY_OF\"");
    }
}
