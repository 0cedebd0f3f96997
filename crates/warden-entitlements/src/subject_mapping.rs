//! Native evaluation of subject mappings.
//!
//! [`SubjectMappingEngine`] answers [`ENTITLEMENTS_PATH`] without an external
//! policy engine: it resolves the input entity through the ERS, flattens each
//! record it gets back and grants every value whose subject mappings hold.
//!
//! ```text
//! mapping holds    = any subject mapping on the value holds
//! SCS holds        = every subject set holds
//! subject set      = every condition group holds
//! condition group  = conditions joined by AND / OR
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use warden_ers::EntityResolver;
use warden_types::{
    AttributeAndValue, BooleanOperator, Condition, ConditionGroup, EntityRepresentation,
    RequestContext, SubjectMapping, SubjectMappingOperator, SubjectSet,
};

use crate::engine::{ENTITLEMENTS_PATH, EntitlementsInput, PolicyEngine};
use crate::error::{EntitlementsError, Result};
use crate::flatten::Flattened;

#[derive(Debug, Clone)]
pub struct SubjectMappingEngine {
    ers: Arc<dyn EntityResolver>,
}

impl SubjectMappingEngine {
    pub fn new(ers: Arc<dyn EntityResolver>) -> Self {
        Self { ers }
    }
}

#[async_trait]
impl PolicyEngine for SubjectMappingEngine {
    async fn evaluate(&self, ctx: &RequestContext, path: &str, input: Value) -> Result<Value> {
        if path != ENTITLEMENTS_PATH {
            return Err(EntitlementsError::UnknownPath(path.to_string()));
        }
        let input = EntitlementsInput::from_value(input)?;
        let representations = self
            .ers
            .resolve_entities(ctx, std::slice::from_ref(&input.entity))
            .await?;

        let mut results = serde_json::Map::new();
        for representation in &representations {
            let granted = evaluate_representation(&input.attribute_mappings, representation)?;
            debug!(
                entity_id = %representation.original_id,
                granted = granted.len(),
                "subject mappings evaluated"
            );
            results.insert(
                representation.original_id.clone(),
                Value::Array(granted.into_iter().map(Value::String).collect()),
            );
        }
        Ok(Value::Object(results))
    }
}

/// Value FQNs granted to one resolved entity, across all of its records.
pub fn evaluate_representation(
    attribute_mappings: &BTreeMap<String, AttributeAndValue>,
    representation: &EntityRepresentation,
) -> Result<BTreeSet<String>> {
    let mut granted = BTreeSet::new();
    for record in &representation.additional_props {
        let flattened = Flattened::new(record);
        for (fqn, mapped) in attribute_mappings {
            if granted.contains(fqn) {
                continue;
            }
            if any_mapping_holds(&mapped.value.subject_mappings, &flattened)? {
                granted.insert(fqn.clone());
            }
        }
    }
    Ok(granted)
}

fn any_mapping_holds(mappings: &[SubjectMapping], entity: &Flattened) -> Result<bool> {
    for mapping in mappings {
        if all_sets_hold(&mapping.subject_condition_set.subject_sets, entity)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn all_sets_hold(sets: &[SubjectSet], entity: &Flattened) -> Result<bool> {
    for set in sets {
        for group in &set.condition_groups {
            if !evaluate_condition_group(group, entity)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

pub fn evaluate_condition_group(group: &ConditionGroup, entity: &Flattened) -> Result<bool> {
    let all = match group.boolean_operator {
        BooleanOperator::And => true,
        BooleanOperator::Or => false,
        BooleanOperator::Unspecified => {
            return Err(EntitlementsError::Evaluation(
                "unspecified condition group boolean operator".to_string(),
            ));
        }
    };
    for condition in &group.conditions {
        let holds = evaluate_condition(condition, entity)?;
        if holds != all {
            return Ok(holds);
        }
    }
    Ok(all)
}

pub fn evaluate_condition(condition: &Condition, entity: &Flattened) -> Result<bool> {
    let selected = entity.select(&condition.subject_external_selector_value);
    let wanted = &condition.subject_external_values;
    let any_equal = || {
        selected
            .iter()
            .filter_map(|v| v.as_str())
            .any(|s| wanted.iter().any(|w| w == s))
    };
    match condition.operator {
        SubjectMappingOperator::In => Ok(any_equal()),
        SubjectMappingOperator::NotIn => Ok(!any_equal()),
        SubjectMappingOperator::InContains => Ok(selected.iter().any(|v| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            wanted.iter().any(|w| text.contains(w.as_str()))
        })),
        SubjectMappingOperator::Unspecified => Err(EntitlementsError::Evaluation(
            "unspecified subject mapping operator".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{definition, mapping};
    use serde_json::json;
    use test_case::test_case;
    use warden_ers::ClaimsResolver;
    use warden_types::{AttributeRule, Entity};

    fn entity(record: &Value) -> Flattened {
        Flattened::new(record.as_object().unwrap())
    }

    fn condition(selector: &str, operator: SubjectMappingOperator, values: &[&str]) -> Condition {
        Condition {
            subject_external_selector_value: selector.to_string(),
            operator,
            subject_external_values: values.iter().map(ToString::to_string).collect(),
        }
    }

    #[test_case(SubjectMappingOperator::In, &["nurse", "doctor"], true ; "in match")]
    #[test_case(SubjectMappingOperator::In, &["admin"], false ; "in miss")]
    #[test_case(SubjectMappingOperator::NotIn, &["admin"], true ; "not in miss")]
    #[test_case(SubjectMappingOperator::NotIn, &["nurse"], false ; "not in match")]
    #[test_case(SubjectMappingOperator::InContains, &["urs"], true ; "contains match")]
    #[test_case(SubjectMappingOperator::InContains, &["xyz"], false ; "contains miss")]
    fn operators(operator: SubjectMappingOperator, values: &[&str], expected: bool) {
        let record = entity(&json!({"roles": ["nurse", "clerk"]}));
        let cond = condition(".roles[]", operator, values);
        assert_eq!(evaluate_condition(&cond, &record).unwrap(), expected);
    }

    #[test]
    fn not_in_passes_on_empty_selection() {
        let record = entity(&json!({"name": "x"}));
        let cond = condition(".roles[]", SubjectMappingOperator::NotIn, &["nurse"]);
        assert!(evaluate_condition(&cond, &record).unwrap());
    }

    #[test]
    fn in_contains_stringifies_scalars() {
        let record = entity(&json!({"clearance": 42}));
        let cond = condition(".clearance", SubjectMappingOperator::InContains, &["4"]);
        assert!(evaluate_condition(&cond, &record).unwrap());
    }

    #[test]
    fn in_ignores_non_strings() {
        let record = entity(&json!({"level": 3}));
        let cond = condition(".level", SubjectMappingOperator::In, &["3"]);
        assert!(!evaluate_condition(&cond, &record).unwrap());
    }

    #[test]
    fn unspecified_operators_are_errors() {
        let record = entity(&json!({"a": "b"}));
        let cond = condition(".a", SubjectMappingOperator::Unspecified, &["b"]);
        assert!(evaluate_condition(&cond, &record).is_err());

        let group = ConditionGroup {
            boolean_operator: BooleanOperator::Unspecified,
            conditions: vec![condition(".a", SubjectMappingOperator::In, &["b"])],
        };
        assert!(evaluate_condition_group(&group, &record).is_err());
    }

    #[test_case(BooleanOperator::And, false ; "and needs all")]
    #[test_case(BooleanOperator::Or, true ; "or needs one")]
    fn group_operators(operator: BooleanOperator, expected: bool) {
        let record = entity(&json!({"groups": ["/medical"], "roles": ["clerk"]}));
        let group = ConditionGroup {
            boolean_operator: operator,
            conditions: vec![
                condition(".groups[]", SubjectMappingOperator::In, &["/medical"]),
                condition(".roles[]", SubjectMappingOperator::In, &["nurse", "doctor"]),
            ],
        };
        assert_eq!(evaluate_condition_group(&group, &record).unwrap(), expected);
    }

    fn mappings() -> BTreeMap<String, AttributeAndValue> {
        let mut def = definition("dept", AttributeRule::AnyOf, &["eng", "sales"]);
        def.populate_fqns().unwrap();
        def.values[0].subject_mappings = vec![
            mapping(".department", &["engineering"]),
            mapping(".team", &["platform"]),
        ];
        def.values[1].subject_mappings = vec![mapping(".department", &["sales"])];
        def.values
            .iter()
            .map(|v| {
                (
                    v.fqn.clone(),
                    AttributeAndValue {
                        attribute: def.clone(),
                        value: v.clone(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn mappings_on_one_value_are_ored() {
        let rep = EntityRepresentation {
            original_id: "e1".into(),
            additional_props: vec![json!({"team": "platform"}).as_object().unwrap().clone()],
        };
        let granted = evaluate_representation(&mappings(), &rep).unwrap();
        assert_eq!(
            granted.into_iter().collect::<Vec<_>>(),
            ["https://www.example.org/attr/dept/value/eng"]
        );
    }

    #[test]
    fn grants_union_across_records() {
        let rep = EntityRepresentation {
            original_id: "e1".into(),
            additional_props: vec![
                json!({"department": "engineering"}).as_object().unwrap().clone(),
                json!({"department": "sales"}).as_object().unwrap().clone(),
            ],
        };
        assert_eq!(evaluate_representation(&mappings(), &rep).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn engine_resolves_entity_and_keys_by_id() {
        let engine = SubjectMappingEngine::new(Arc::new(ClaimsResolver::new()));
        let input = EntitlementsInput {
            entity: Entity::claims(json!({"department": "sales"})).with_ephemeral_id("e7"),
            attribute_mappings: mappings(),
            idp: None,
        };
        let result = engine
            .evaluate(&RequestContext::new(), ENTITLEMENTS_PATH, input.to_value().unwrap())
            .await
            .unwrap();
        assert_eq!(
            result,
            json!({"e7": ["https://www.example.org/attr/dept/value/sales"]})
        );
    }

    #[tokio::test]
    async fn unknown_path_is_retrieval_failure() {
        let engine = SubjectMappingEngine::new(Arc::new(ClaimsResolver::new()));
        let err = engine
            .evaluate(&RequestContext::new(), "opentdf/other", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), warden_types::ErrorKind::RetrievalFailed);
    }
}
