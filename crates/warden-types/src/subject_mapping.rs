//! Subject mappings: conditions over entity records that grant attribute values.
//!
//! ```text
//! SubjectMapping
//!   └─ SubjectConditionSet      every subject set must hold
//!        └─ SubjectSet          every condition group must hold
//!             └─ ConditionGroup conditions joined by AND / OR
//!                  └─ Condition selector + operator + values
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubjectMapping {
    pub id: String,
    pub subject_condition_set: SubjectConditionSet,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubjectConditionSet {
    pub id: String,
    pub subject_sets: Vec<SubjectSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubjectSet {
    pub condition_groups: Vec<ConditionGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionGroup {
    pub boolean_operator: BooleanOperator,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    /// Flattened selector into the entity record, e.g. `.groups[]`.
    pub subject_external_selector_value: String,
    pub operator: SubjectMappingOperator,
    pub subject_external_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BooleanOperator {
    #[default]
    Unspecified,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubjectMappingOperator {
    #[default]
    Unspecified,
    In,
    NotIn,
    InContains,
}
