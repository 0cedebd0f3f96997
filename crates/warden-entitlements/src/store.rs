//! Paginated access to attribute values in the policy store.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use async_trait::async_trait;
use tracing::debug;
use warden_types::{AttributeAndValue, AttributeDefinition, RequestContext, canonicalize};

use crate::error::{EntitlementsError, Result};

/// Page size used when draining a paginated lookup.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One page of an attribute-value lookup by FQN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValuesRequest {
    pub fqns: Vec<String>,
    /// Include subject mappings on each returned value.
    pub with_subject_maps: bool,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeValuesPage {
    /// Keyed by canonical value FQN.
    pub values: BTreeMap<String, AttributeAndValue>,
    /// Offset of the next page; zero when this was the last one.
    pub next_offset: usize,
}

#[async_trait]
pub trait AttributeStore: Send + Sync + Debug {
    async fn get_attribute_values_by_fqns(
        &self,
        ctx: &RequestContext,
        request: &AttributeValuesRequest,
    ) -> Result<AttributeValuesPage>;
}

/// Fetches every page for `fqns`, following `next_offset` until it is zero.
///
/// Missing values and cancellation keep their kind; any other store failure
/// is reported as a retrieval failure.
pub async fn fetch_attribute_values(
    store: &dyn AttributeStore,
    ctx: &RequestContext,
    fqns: &[String],
    with_subject_maps: bool,
) -> Result<BTreeMap<String, AttributeAndValue>> {
    let mut values = BTreeMap::new();
    let mut offset = 0;
    loop {
        let request = AttributeValuesRequest {
            fqns: fqns.to_vec(),
            with_subject_maps,
            offset,
            limit: DEFAULT_PAGE_SIZE,
        };
        let page = store
            .get_attribute_values_by_fqns(ctx, &request)
            .await
            .map_err(|e| match e {
                EntitlementsError::AttributeNotFound { .. } | EntitlementsError::Cancelled(_) => e,
                other => EntitlementsError::RetrievalFailed(format!(
                    "attribute values at offset {offset}: {other}"
                )),
            })?;
        debug!(offset, count = page.values.len(), next = page.next_offset, "attribute page");
        values.extend(page.values);
        if page.next_offset == 0 || page.next_offset <= offset {
            return Ok(values);
        }
        offset = page.next_offset;
    }
}

// ============================================================================
// InMemoryAttributeStore
// ============================================================================

/// Attribute definitions held in memory and served by value FQN.
#[derive(Debug, Default)]
pub struct InMemoryAttributeStore {
    definitions: Vec<AttributeDefinition>,
    /// Canonical value FQN to (definition, value) index.
    index: HashMap<String, (usize, usize)>,
}

impl InMemoryAttributeStore {
    pub fn new(definitions: impl IntoIterator<Item = AttributeDefinition>) -> Result<Self> {
        let mut store = Self::default();
        for definition in definitions {
            store.insert(definition)?;
        }
        Ok(store)
    }

    /// Adds a definition, filling in any missing FQNs.
    pub fn insert(&mut self, mut definition: AttributeDefinition) -> Result<()> {
        definition.populate_fqns()?;
        let def_idx = self.definitions.len();
        for (value_idx, value) in definition.values.iter().enumerate() {
            self.index
                .insert(canonicalize(&value.fqn), (def_idx, value_idx));
        }
        self.definitions.push(definition);
        Ok(())
    }

    fn lookup(&self, fqn: &str, with_subject_maps: bool) -> Option<AttributeAndValue> {
        let &(def_idx, value_idx) = self.index.get(fqn)?;
        let mut attribute = self.definitions[def_idx].clone();
        let mut value = attribute.values[value_idx].clone();
        for v in &mut attribute.values {
            v.subject_mappings.clear();
        }
        if !with_subject_maps {
            value.subject_mappings.clear();
        }
        Some(AttributeAndValue { attribute, value })
    }
}

#[async_trait]
impl AttributeStore for InMemoryAttributeStore {
    async fn get_attribute_values_by_fqns(
        &self,
        ctx: &RequestContext,
        request: &AttributeValuesRequest,
    ) -> Result<AttributeValuesPage> {
        ctx.check()?;
        let mut fqns: Vec<String> = request.fqns.iter().map(|f| canonicalize(f)).collect();
        fqns.sort();
        fqns.dedup();

        let start = request.offset.min(fqns.len());
        let end = start.saturating_add(request.limit.max(1)).min(fqns.len());
        let mut values = BTreeMap::new();
        for fqn in &fqns[start..end] {
            let found = self
                .lookup(fqn, request.with_subject_maps)
                .ok_or_else(|| EntitlementsError::AttributeNotFound { fqn: fqn.clone() })?;
            values.insert(fqn.clone(), found);
        }
        Ok(AttributeValuesPage {
            values,
            next_offset: if end < fqns.len() { end } else { 0 },
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use warden_types::{
        AttributeRule, AttributeValue, BooleanOperator, Condition, ConditionGroup,
        SubjectConditionSet, SubjectMapping, SubjectMappingOperator, SubjectSet,
    };

    /// Helper: a mapping granting its value when `selector` is IN `values`.
    pub(crate) fn mapping(selector: &str, values: &[&str]) -> SubjectMapping {
        SubjectMapping {
            subject_condition_set: SubjectConditionSet {
                subject_sets: vec![SubjectSet {
                    condition_groups: vec![ConditionGroup {
                        boolean_operator: BooleanOperator::And,
                        conditions: vec![Condition {
                            subject_external_selector_value: selector.to_string(),
                            operator: SubjectMappingOperator::In,
                            subject_external_values: values.iter().map(ToString::to_string).collect(),
                        }],
                    }],
                }],
                ..SubjectConditionSet::default()
            },
            ..SubjectMapping::default()
        }
    }

    /// Helper: a definition under `www.example.org` with plain values.
    pub(crate) fn definition(name: &str, rule: AttributeRule, values: &[&str]) -> AttributeDefinition {
        AttributeDefinition {
            namespace: "www.example.org".to_string(),
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
        }
    }

    /// Store wrapper that records the offsets it was asked for.
    #[derive(Debug)]
    pub(crate) struct PagingStore {
        pub inner: InMemoryAttributeStore,
        pub limit: usize,
        pub offsets: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl AttributeStore for PagingStore {
        async fn get_attribute_values_by_fqns(
            &self,
            ctx: &RequestContext,
            request: &AttributeValuesRequest,
        ) -> Result<AttributeValuesPage> {
            self.offsets.lock().push(request.offset);
            let request = AttributeValuesRequest {
                limit: self.limit,
                ..request.clone()
            };
            self.inner.get_attribute_values_by_fqns(ctx, &request).await
        }
    }

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl AttributeStore for BrokenStore {
        async fn get_attribute_values_by_fqns(
            &self,
            _ctx: &RequestContext,
            _request: &AttributeValuesRequest,
        ) -> Result<AttributeValuesPage> {
            Err(EntitlementsError::Evaluation("connection reset".into()))
        }
    }

    fn fqn(value: &str) -> String {
        format!("https://www.example.org/attr/letters/value/{value}")
    }

    #[tokio::test]
    async fn drains_every_page() {
        let store = PagingStore {
            inner: InMemoryAttributeStore::new([definition(
                "letters",
                AttributeRule::AnyOf,
                &["a", "b", "c", "d", "e"],
            )])
            .unwrap(),
            limit: 2,
            offsets: Mutex::new(Vec::new()),
        };
        let fqns: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|v| fqn(v)).collect();
        let values = fetch_attribute_values(&store, &RequestContext::new(), &fqns, false)
            .await
            .unwrap();
        assert_eq!(values.len(), 5);
        assert_eq!(*store.offsets.lock(), [0, 2, 4]);
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store =
            InMemoryAttributeStore::new([definition("letters", AttributeRule::AnyOf, &["a"])]).unwrap();
        let values = fetch_attribute_values(
            &store,
            &RequestContext::new(),
            &["https://WWW.example.org/attr/letters/value/A".to_string()],
            false,
        )
        .await
        .unwrap();
        assert!(values.contains_key(&fqn("a")));
    }

    #[tokio::test]
    async fn subject_maps_only_when_requested() {
        let mut def = definition("letters", AttributeRule::AnyOf, &["a"]);
        def.values[0].subject_mappings.push(mapping(".role", &["admin"]));
        let store = InMemoryAttributeStore::new([def]).unwrap();
        let ctx = RequestContext::new();

        let without = fetch_attribute_values(&store, &ctx, &[fqn("a")], false).await.unwrap();
        assert!(without[&fqn("a")].value.subject_mappings.is_empty());

        let with = fetch_attribute_values(&store, &ctx, &[fqn("a")], true).await.unwrap();
        assert_eq!(with[&fqn("a")].value.subject_mappings.len(), 1);
        assert!(with[&fqn("a")].attribute.values[0].subject_mappings.is_empty());
    }

    #[tokio::test]
    async fn unknown_fqn_is_not_found() {
        let store = InMemoryAttributeStore::default();
        let err = fetch_attribute_values(&store, &RequestContext::new(), &[fqn("zz")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, EntitlementsError::AttributeNotFound { .. }));
    }

    #[tokio::test]
    async fn store_failure_is_retrieval_failure() {
        let err = fetch_attribute_values(&BrokenStore, &RequestContext::new(), &[fqn("a")], false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), warden_types::ErrorKind::RetrievalFailed);
    }
}
