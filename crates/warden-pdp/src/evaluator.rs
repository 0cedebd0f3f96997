//! Attribute rule evaluation.
//!
//! Data values are grouped by definition FQN; each group is evaluated against
//! every entity under its definition's rule, and per-definition results are
//! AND-ed into one [`Decision`] per entity. All FQN comparisons happen on the
//! canonical lowercase form.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, warn};
use warden_types::{
    AttributeDefinition, AttributeRule, AttributeValue, build_fqn, canonicalize,
    definition_fqn_from_value_fqn,
};

use crate::decision::{DataRuleResult, Decision, ValueFailure};
use crate::error::{PdpError, Result};

// ============================================================================
// Public API
// ============================================================================

/// Decides access for every entity in `entity_fqns` against `data_values`.
///
/// `entity_fqns` maps entity ids to the value FQNs each entity is entitled
/// to. Every definition referenced by a data value must be present in
/// `definitions`.
///
/// Empty `data_values` yields an empty map. Entities absent from
/// `entity_fqns` get no entry.
pub fn determine_access(
    data_values: &[AttributeValue],
    entity_fqns: &BTreeMap<String, Vec<String>>,
    definitions: &[AttributeDefinition],
) -> Result<BTreeMap<String, Decision>> {
    let mut decisions = BTreeMap::new();
    if data_values.is_empty() {
        debug!("no data attribute values provided");
        return Ok(decisions);
    }

    let groups = group_by_definition(data_values)?;
    let index = index_definitions(definitions)?;
    let entities = entity_fqns
        .iter()
        .map(|(id, fqns)| Ok((id.as_str(), EntityValues::new(fqns)?)))
        .collect::<Result<Vec<_>>>()?;

    for (definition_fqn, values) in &groups {
        debug!(definition = %definition_fqn, "evaluating data attribute");
        let definition = index
            .get(definition_fqn.as_str())
            .ok_or_else(|| PdpError::MissingDefinition(definition_fqn.clone()))?;

        let results = match definition.rule {
            AttributeRule::AllOf => all_of(definition_fqn, values, &entities),
            AttributeRule::AnyOf => any_of(definition_fqn, values, &entities),
            AttributeRule::Hierarchy => {
                hierarchy(definition, definition_fqn, values, &entities)?
            }
            AttributeRule::Unspecified => {
                return Err(PdpError::UnspecifiedRule(definition_fqn.clone()));
            }
        };

        for (entity_id, (passed, value_failures)) in results {
            let result = DataRuleResult {
                passed,
                rule_definition: (*definition).clone(),
                value_failures,
            };
            match decisions.get_mut(entity_id) {
                Some(decision) => Decision::merge(decision, result),
                None => {
                    decisions.insert(entity_id.to_string(), Decision::from_result(result));
                }
            }
        }
    }

    Ok(decisions)
}

// ============================================================================
// Grouping
// ============================================================================

type RuleOutcome<'e> = Vec<(&'e str, (bool, Vec<ValueFailure>))>;

/// One entity's entitled value FQNs, grouped by definition FQN.
struct EntityValues {
    by_definition: HashMap<String, BTreeSet<String>>,
}

impl EntityValues {
    fn new(fqns: &[String]) -> Result<Self> {
        let mut by_definition: HashMap<String, BTreeSet<String>> = HashMap::new();
        for fqn in fqns {
            let definition = definition_fqn_from_value_fqn(fqn)?;
            by_definition
                .entry(definition)
                .or_default()
                .insert(canonicalize(fqn));
        }
        Ok(Self { by_definition })
    }

    fn under(&self, definition_fqn: &str) -> Option<&BTreeSet<String>> {
        self.by_definition.get(definition_fqn)
    }

    fn holds(&self, definition_fqn: &str, value_fqn: &str) -> bool {
        self.under(definition_fqn)
            .is_some_and(|set| set.contains(value_fqn))
    }
}

/// A data value together with its canonical FQN.
struct DataValue<'a> {
    value: &'a AttributeValue,
    fqn: String,
}

impl DataValue<'_> {
    /// The bare value, for messages.
    fn display(&self) -> &str {
        if !self.value.value.is_empty() {
            return &self.value.value;
        }
        self.fqn
            .rsplit_once("/value/")
            .map_or(self.fqn.as_str(), |(_, v)| v)
    }
}

/// Groups data values by definition FQN, preserving first-appearance order
/// and dropping duplicate FQNs within a group.
fn group_by_definition(data_values: &[AttributeValue]) -> Result<Vec<(String, Vec<DataValue<'_>>)>> {
    let mut groups: Vec<(String, Vec<DataValue<'_>>)> = Vec::new();
    for value in data_values {
        let definition = definition_fqn_from_value_fqn(&value.fqn)?;
        let fqn = canonicalize(&value.fqn);
        let group = match groups.iter().position(|(d, _)| *d == definition) {
            Some(idx) => &mut groups[idx].1,
            None => {
                groups.push((definition, Vec::new()));
                let last = groups.len() - 1;
                &mut groups[last].1
            }
        };
        if !group.iter().any(|d| d.fqn == fqn) {
            group.push(DataValue { value, fqn });
        }
    }
    Ok(groups)
}

fn index_definitions(definitions: &[AttributeDefinition]) -> Result<HashMap<String, &AttributeDefinition>> {
    let mut index = HashMap::with_capacity(definitions.len());
    for definition in definitions {
        let fqn = definition.definition_fqn()?;
        if index.insert(fqn.clone(), definition).is_some() {
            warn!(definition = %fqn, "duplicate attribute definition FQN; keeping the last");
        }
    }
    Ok(index)
}

// ============================================================================
// Rules
// ============================================================================

/// Every data value must be held by the entity.
fn all_of<'e>(
    definition_fqn: &str,
    values: &[DataValue<'_>],
    entities: &[(&'e str, EntityValues)],
) -> RuleOutcome<'e> {
    entities
        .iter()
        .map(|(entity_id, held)| {
            let held_count = held.under(definition_fqn).map_or(0, BTreeSet::len);
            // Too few values under this definition: no point looking each one up.
            let short = held_count < values.len();

            let failures: Vec<ValueFailure> = values
                .iter()
                .filter(|v| short || !held.holds(definition_fqn, &v.fqn))
                .map(|v| {
                    let message = format!(
                        "AllOf not satisfied for data attr {definition_fqn} with value {} and entity {entity_id}",
                        v.display()
                    );
                    warn!("{message}");
                    ValueFailure {
                        data_attribute: Some(v.value.clone()),
                        message,
                    }
                })
                .collect();

            (*entity_id, (failures.is_empty(), failures))
        })
        .collect()
}

/// At least one data value must be held by the entity.
fn any_of<'e>(
    definition_fqn: &str,
    values: &[DataValue<'_>],
    entities: &[(&'e str, EntityValues)],
) -> RuleOutcome<'e> {
    entities
        .iter()
        .map(|(entity_id, held)| {
            if values.iter().any(|v| held.holds(definition_fqn, &v.fqn)) {
                debug!(definition = %definition_fqn, entity_id, "anyOf satisfied");
                return (*entity_id, (true, Vec::new()));
            }

            warn!(definition = %definition_fqn, entity_id, "anyOf not satisfied");
            let failures = values
                .iter()
                .map(|v| ValueFailure {
                    data_attribute: Some(v.value.clone()),
                    message: format!(
                        "anyOf not satisfied for data attr {definition_fqn} with value {} and entity {entity_id}",
                        v.display()
                    ),
                })
                .collect();
            (*entity_id, (false, failures))
        })
        .collect()
}

/// Ranks of a hierarchy definition's ordered values. Index 0 is the highest rank.
struct Ranking {
    len: usize,
    by_fqn: HashMap<String, usize>,
    by_value: HashMap<String, usize>,
}

impl Ranking {
    fn new(definition: &AttributeDefinition) -> Result<Self> {
        let mut by_fqn = HashMap::with_capacity(definition.values.len());
        let mut by_value = HashMap::with_capacity(definition.values.len());
        for (idx, value) in definition.values.iter().enumerate() {
            let fqn = if value.fqn.is_empty() {
                build_fqn(&definition.namespace, &definition.name, &value.value)?
            } else {
                canonicalize(&value.fqn)
            };
            by_fqn.entry(fqn).or_insert(idx);
            if !value.value.is_empty() {
                by_value.entry(value.value.to_lowercase()).or_insert(idx);
            }
        }
        Ok(Self {
            len: definition.values.len(),
            by_fqn,
            by_value,
        })
    }

    fn of_data(&self, value: &DataValue<'_>) -> Option<usize> {
        self.by_fqn.get(&value.fqn).copied().or_else(|| {
            (!value.value.value.is_empty())
                .then(|| self.by_value.get(&value.value.value.to_lowercase()).copied())
                .flatten()
        })
    }

    /// Unknown entity values rank below everything in the definition.
    fn of_entity(&self, fqn: &str) -> usize {
        self.by_fqn.get(fqn).copied().unwrap_or(self.len + 1)
    }
}

/// The entity passes iff it holds at least one value under the definition and
/// none of its values rank below the highest-ranked data value.
fn hierarchy<'e>(
    definition: &AttributeDefinition,
    definition_fqn: &str,
    values: &[DataValue<'_>],
    entities: &[(&'e str, EntityValues)],
) -> Result<RuleOutcome<'e>> {
    let ranking = Ranking::new(definition)?;

    let highest = values
        .iter()
        .filter_map(|v| match ranking.of_data(v) {
            Some(rank) => Some((rank, v)),
            None => {
                warn!(value = %v.fqn, definition = %definition_fqn, "data value is not in the definition's ordered values; ignoring");
                None
            }
        })
        .min_by_key(|(rank, _)| *rank);

    match highest {
        Some((_, v)) => debug!(value = v.display(), "highest ranked hierarchy data value"),
        None => warn!(
            definition = %definition_fqn,
            "no data value matches the definition's values; all entities will be denied"
        ),
    }

    let outcome = entities
        .iter()
        .map(|(entity_id, held)| {
            let Some((data_rank, data_value)) = highest else {
                let message = format!(
                    "Hierarchy - No data values found exist in attribute definition, no hierarchy comparison possible, entity {entity_id} is denied"
                );
                warn!("{message}");
                return (
                    *entity_id,
                    (
                        false,
                        vec![ValueFailure {
                            data_attribute: None,
                            message,
                        }],
                    ),
                );
            };

            let passed = held.under(definition_fqn).is_some_and(|set| {
                !set.is_empty() && set.iter().all(|fqn| ranking.of_entity(fqn) <= data_rank)
            });
            if passed {
                return (*entity_id, (true, Vec::new()));
            }

            let message = format!(
                "Hierarchy - Entity: {entity_id} hierarchy values rank below data hierarchy value of {}",
                data_value.display()
            );
            warn!("{message}");
            (
                *entity_id,
                (
                    false,
                    vec![ValueFailure {
                        data_attribute: Some(data_value.value.clone()),
                        message,
                    }],
                ),
            )
        })
        .collect();

    Ok(outcome)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    const NS: &str = "www.example.org";

    /// Helper: a definition `https://www.example.org/attr/<name>` with FQNs populated.
    fn definition(name: &str, rule: AttributeRule, values: &[&str]) -> AttributeDefinition {
        let mut def = AttributeDefinition {
            namespace: NS.to_string(),
            name: name.to_string(),
            rule,
            values: values
                .iter()
                .map(|v| AttributeValue {
                    value: (*v).to_string(),
                    ..AttributeValue::default()
                })
                .collect(),
            ..AttributeDefinition::default()
        };
        def.populate_fqns().unwrap();
        def
    }

    fn fqn(name: &str, value: &str) -> String {
        format!("https://{NS}/attr/{name}/value/{value}")
    }

    fn data(fqns: &[String]) -> Vec<AttributeValue> {
        fqns.iter().map(AttributeValue::from_fqn).collect()
    }

    fn entity(id: &str, fqns: &[String]) -> BTreeMap<String, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert(id.to_string(), fqns.to_vec());
        map
    }

    #[test]
    fn test_all_of_pass() {
        let def = definition("foo", AttributeRule::AllOf, &["value1"]);
        let fqn1 = fqn("foo", "value1");
        let decisions =
            determine_access(&data(&[fqn1.clone()]), &entity("e1", &[fqn1]), &[def]).unwrap();
        assert!(decisions["e1"].access);
        assert_eq!(decisions["e1"].results.len(), 1);
        assert!(decisions["e1"].results[0].value_failures.is_empty());
    }

    #[test]
    fn test_all_of_missing_value() {
        let def = definition("foo", AttributeRule::AllOf, &["value1", "value2"]);
        let (fqn1, fqn2) = (fqn("foo", "value1"), fqn("foo", "value2"));
        let decisions = determine_access(
            &data(&[fqn1.clone(), fqn2.clone()]),
            &entity("e1", &[fqn1.clone(), fqn("foo", "value3")]),
            &[def],
        )
        .unwrap();

        let decision = &decisions["e1"];
        assert!(!decision.access);
        let failures = &decision.results[0].value_failures;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].data_attribute.as_ref().unwrap().fqn, fqn2);
        assert_eq!(
            failures[0].message,
            "AllOf not satisfied for data attr https://www.example.org/attr/foo with value value2 and entity e1"
        );
    }

    #[test]
    fn test_all_of_short_entity_fails_every_value() {
        let def = definition("foo", AttributeRule::AllOf, &["value1", "value2"]);
        let (fqn1, fqn2) = (fqn("foo", "value1"), fqn("foo", "value2"));
        let decisions =
            determine_access(&data(&[fqn1.clone(), fqn2]), &entity("e1", &[fqn1]), &[def]).unwrap();
        assert!(!decisions["e1"].access);
        assert_eq!(decisions["e1"].results[0].value_failures.len(), 2);
    }

    #[test]
    fn test_any_of() {
        let def = definition("foo", AttributeRule::AnyOf, &["a", "b", "c"]);
        let values = data(&[fqn("foo", "a"), fqn("foo", "b")]);

        let pass = determine_access(&values, &entity("e1", &[fqn("foo", "b")]), &[def.clone()])
            .unwrap();
        assert!(pass["e1"].access);
        assert!(pass["e1"].results[0].value_failures.is_empty());

        let fail = determine_access(&values, &entity("e1", &[fqn("foo", "c")]), &[def]).unwrap();
        assert!(!fail["e1"].access);
        assert_eq!(fail["e1"].results[0].value_failures.len(), 2);
    }

    #[test_case(&["top"], &["mid"], true ; "higher entity rank passes")]
    #[test_case(&["mid"], &["mid"], true ; "equal rank passes")]
    #[test_case(&["low"], &["mid"], false ; "lower entity rank fails")]
    #[test_case(&["top", "mid"], &["mid", "top"], false ; "lower held value disqualifies")]
    #[test_case(&["mid"], &["low", "top"], false ; "highest data value is used")]
    #[test_case(&[], &["low"], false ; "no entity values fails")]
    fn test_hierarchy(held: &[&str], data_values: &[&str], expected: bool) {
        let def = definition("level", AttributeRule::Hierarchy, &["top", "mid", "low"]);
        let held: Vec<String> = held.iter().map(|v| fqn("level", v)).collect();
        let values: Vec<String> = data_values.iter().map(|v| fqn("level", v)).collect();
        let decisions = determine_access(&data(&values), &entity("e1", &held), &[def]).unwrap();
        assert_eq!(decisions["e1"].access, expected);
        if !expected {
            assert_eq!(decisions["e1"].results[0].value_failures.len(), 1);
        }
    }

    #[test]
    fn test_hierarchy_unknown_entity_value_fails() {
        let def = definition("level", AttributeRule::Hierarchy, &["top", "mid", "low"]);
        let decisions = determine_access(
            &data(&[fqn("level", "low")]),
            &entity("e1", &[fqn("level", "top"), fqn("level", "bogus")]),
            &[def],
        )
        .unwrap();
        assert!(!decisions["e1"].access);
    }

    #[test]
    fn test_hierarchy_without_known_data_value_denies_with_sentinel() {
        let def = definition("level", AttributeRule::Hierarchy, &["top", "mid"]);
        let decisions = determine_access(
            &data(&[fqn("level", "unknown")]),
            &entity("e1", &[fqn("level", "top")]),
            &[def],
        )
        .unwrap();
        let decision = &decisions["e1"];
        assert!(!decision.access);
        assert!(decision.results[0].value_failures[0].data_attribute.is_none());
    }

    #[test]
    fn test_roll_up_is_and_over_definitions() {
        let foo = definition("foo", AttributeRule::AllOf, &["a"]);
        let bar = definition("bar", AttributeRule::AnyOf, &["x"]);
        let values = data(&[fqn("foo", "a"), fqn("bar", "x")]);
        let decisions = determine_access(&values, &entity("e1", &[fqn("foo", "a")]), &[foo, bar])
            .unwrap();
        let decision = &decisions["e1"];
        assert!(!decision.access);
        assert_eq!(decision.results.len(), 2);
        assert!(decision.results[0].passed);
        assert!(!decision.results[1].passed);
        assert_eq!(decision.results[1].rule_definition.name, "bar");
    }

    #[test]
    fn test_empty_data_values_yields_no_decisions() {
        let def = definition("foo", AttributeRule::AllOf, &["a"]);
        let decisions = determine_access(&[], &entity("e1", &[fqn("foo", "a")]), &[def]).unwrap();
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_missing_definition_errors() {
        let err = determine_access(&data(&[fqn("foo", "a")]), &entity("e1", &[]), &[]).unwrap_err();
        assert_eq!(
            err,
            PdpError::MissingDefinition("https://www.example.org/attr/foo".to_string())
        );
    }

    #[test]
    fn test_unspecified_rule_errors() {
        let def = definition("foo", AttributeRule::Unspecified, &["a"]);
        let err = determine_access(&data(&[fqn("foo", "a")]), &entity("e1", &[]), &[def]).unwrap_err();
        assert!(matches!(err, PdpError::UnspecifiedRule(_)));
    }

    #[test]
    fn test_data_value_without_marker_errors() {
        let def = definition("foo", AttributeRule::AllOf, &["a"]);
        let err = determine_access(
            &[AttributeValue::from_fqn("https://www.example.org/attr/foo")],
            &entity("e1", &[]),
            &[def],
        )
        .unwrap_err();
        assert_eq!(err.kind(), warden_types::ErrorKind::InvalidArgument);
    }

    // ------------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------------

    fn rule_strategy() -> impl Strategy<Value = AttributeRule> {
        prop_oneof![Just(AttributeRule::AllOf), Just(AttributeRule::AnyOf)]
    }

    /// Flips the case of character `i` when bit `i % 64` of `mask` is set.
    fn recase(s: &str, mask: u64) -> String {
        s.chars()
            .enumerate()
            .map(|(i, c)| {
                if mask & (1 << (i % 64)) != 0 {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect()
    }

    fn value_names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("v{i}")).collect()
    }

    proptest! {
        /// An entity holding exactly the data values is granted access.
        #[test]
        fn prop_holding_data_values_grants(
            rule in rule_strategy(),
            n in 1usize..8,
            picks in proptest::collection::btree_set(0usize..8, 1..8),
        ) {
            let names = value_names(n);
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let def = definition("attr", rule, &refs);
            let chosen: Vec<String> = picks.iter().filter(|i| **i < n).map(|i| fqn("attr", &names[*i])).collect();
            prop_assume!(!chosen.is_empty());

            let decisions = determine_access(&data(&chosen), &entity("e", &chosen), &[def]).unwrap();
            prop_assert!(decisions["e"].access);
        }

        /// A single hierarchy data value held by the entity is granted.
        #[test]
        fn prop_hierarchy_single_value_grants(n in 1usize..8, k in 0usize..8) {
            prop_assume!(k < n);
            let names = value_names(n);
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let def = definition("attr", AttributeRule::Hierarchy, &refs);
            let held = vec![fqn("attr", &names[k])];
            let decisions = determine_access(&data(&held), &entity("e", &held), &[def]).unwrap();
            prop_assert!(decisions["e"].access);
        }

        /// Entities with no attributes never satisfy ALL_OF or ANY_OF.
        #[test]
        fn prop_empty_entity_denied(
            rule in rule_strategy(),
            n in 1usize..8,
            picks in proptest::collection::btree_set(0usize..8, 1..8),
        ) {
            let names = value_names(n);
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let def = definition("attr", rule, &refs);
            let chosen: Vec<String> = picks.iter().filter(|i| **i < n).map(|i| fqn("attr", &names[*i])).collect();
            prop_assume!(!chosen.is_empty());

            let decisions = determine_access(&data(&chosen), &entity("e", &[]), &[def]).unwrap();
            prop_assert!(!decisions["e"].access);
        }

        /// Holding v_k passes iff every data rank is >= k; holding v_k and
        /// v_{k+1} passes iff every data rank is >= k+1.
        #[test]
        fn prop_hierarchy_rank_comparison(
            n in 2usize..8,
            k in 0usize..7,
            picks in proptest::collection::btree_set(0usize..8, 1..8),
            with_next in any::<bool>(),
        ) {
            prop_assume!(k + 1 < n);
            let names = value_names(n);
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let def = definition("attr", AttributeRule::Hierarchy, &refs);
            let ranks: Vec<usize> = picks.into_iter().filter(|i| *i < n).collect();
            prop_assume!(!ranks.is_empty());

            let values: Vec<String> = ranks.iter().map(|i| fqn("attr", &names[*i])).collect();
            let mut held = vec![fqn("attr", &names[k])];
            let lowest_held = if with_next {
                held.push(fqn("attr", &names[k + 1]));
                k + 1
            } else {
                k
            };

            let decisions = determine_access(&data(&values), &entity("e", &held), &[def]).unwrap();
            let expected = ranks.iter().all(|r| *r >= lowest_held);
            prop_assert_eq!(decisions["e"].access, expected);
        }

        /// Decisions ignore the case of value FQNs on both sides.
        #[test]
        fn prop_case_insensitive(
            rule in prop_oneof![Just(AttributeRule::AllOf), Just(AttributeRule::AnyOf), Just(AttributeRule::Hierarchy)],
            n in 1usize..6,
            data_picks in proptest::collection::btree_set(0usize..6, 1..6),
            held_picks in proptest::collection::btree_set(0usize..6, 0..6),
            data_mask in any::<u64>(),
            held_mask in any::<u64>(),
        ) {
            let names = value_names(n);
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let def = definition("attr", rule, &refs);
            let values: Vec<String> = data_picks.iter().filter(|i| **i < n).map(|i| fqn("attr", &names[*i])).collect();
            prop_assume!(!values.is_empty());
            let held: Vec<String> = held_picks.iter().filter(|i| **i < n).map(|i| fqn("attr", &names[*i])).collect();

            let baseline = determine_access(&data(&values), &entity("e", &held), &[def.clone()]).unwrap();

            let values_recased: Vec<String> = values.iter().map(|f| recase(f, data_mask)).collect();
            let held_recased: Vec<String> = held.iter().map(|f| recase(f, held_mask)).collect();
            let recased = determine_access(&data(&values_recased), &entity("e", &held_recased), &[def]).unwrap();

            prop_assert_eq!(baseline["e"].access, recased["e"].access);
        }
    }
}
