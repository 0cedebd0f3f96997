//! Entity entitlements: which attribute values each entity holds.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, error};
use warden_types::{
    AttributeAndValue, AttributeRule, Entity, EntityEntitlements, RequestContext,
    ResourceAttribute, assign_ephemeral_ids, canonicalize,
};

use crate::engine::{ENTITLEMENTS_PATH, EntitlementsInput, IdpCredentials, PolicyEngine, entitlements_for};
use crate::error::{EntitlementsError, Result};
use crate::store::{AttributeStore, fetch_attribute_values};
use crate::token::TokenSource;

#[derive(Debug, Clone)]
pub struct EntitlementsResolver {
    store: Arc<dyn AttributeStore>,
    engine: Arc<dyn PolicyEngine>,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl EntitlementsResolver {
    pub fn new(store: Arc<dyn AttributeStore>, engine: Arc<dyn PolicyEngine>) -> Self {
        Self {
            store,
            engine,
            tokens: None,
        }
    }

    /// Passes an IdP bearer token to the policy with every evaluation.
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn store(&self) -> &Arc<dyn AttributeStore> {
        &self.store
    }

    /// Entitlements for each entity within `scope`, in entity order.
    ///
    /// Returned FQNs are lowercase. With `with_comprehensive_hierarchy`, a
    /// hierarchy value also entitles every lower-ranked value of its
    /// definition.
    pub async fn get_entitlements(
        &self,
        ctx: &RequestContext,
        entities: &[Entity],
        scope: Option<&ResourceAttribute>,
        with_comprehensive_hierarchy: bool,
    ) -> Result<Vec<EntityEntitlements>> {
        let Some(scope) = scope else {
            error!("entitlements request requires scope");
            return Err(EntitlementsError::MissingScope);
        };
        if entities.is_empty() {
            error!("entitlements request requires entities");
            return Err(EntitlementsError::MissingEntities);
        }

        let fqns: Vec<String> = scope
            .attribute_value_fqns
            .iter()
            .map(|f| canonicalize(f))
            .collect();
        let mappings = fetch_attribute_values(self.store.as_ref(), ctx, &fqns, true).await?;
        debug!(scope = fqns.len(), mapped = mappings.len(), "retrieved subject mappings");

        let mut entities = entities.to_vec();
        assign_ephemeral_ids(&mut entities);

        let mut entitlements = Vec::with_capacity(entities.len());
        for entity in entities {
            let idp = match &self.tokens {
                Some(tokens) => Some(IdpCredentials {
                    access_token: tokens.token(ctx).await?,
                }),
                None => None,
            };
            let entity_id = entity.ephemeral_id.clone();
            let input = EntitlementsInput {
                entity,
                attribute_mappings: mappings.clone(),
                idp,
            };
            let result = self
                .engine
                .evaluate(ctx, ENTITLEMENTS_PATH, input.to_value()?)
                .await
                .map_err(|e| match e {
                    EntitlementsError::Cancelled(_) => e,
                    other => {
                        error!(entity_id = %entity_id, error = %other, "entitlements evaluation failed");
                        other
                    }
                })?;

            let mut fqns: Vec<String> = entitlements_for(&result, &entity_id)?
                .iter()
                .map(|f| canonicalize(f))
                .collect();
            if with_comprehensive_hierarchy {
                fqns = expand_hierarchy(fqns, &mappings)?;
            }
            debug!(entity_id = %entity_id, fqns = ?fqns, "entitlements resolved");
            entitlements.push(EntityEntitlements {
                entity_id,
                attribute_value_fqns: fqns,
            });
        }
        Ok(entitlements)
    }
}

/// Appends every value ranked below an entitled hierarchy value.
fn expand_hierarchy(
    fqns: Vec<String>,
    mappings: &BTreeMap<String, AttributeAndValue>,
) -> Result<Vec<String>> {
    let mut seen: HashSet<String> = fqns.iter().cloned().collect();
    let mut expanded = fqns.clone();
    for fqn in &fqns {
        let Some(mapped) = mappings.get(fqn) else {
            continue;
        };
        if mapped.attribute.rule != AttributeRule::Hierarchy {
            continue;
        }
        let mut definition = mapped.attribute.clone();
        definition.populate_fqns()?;
        let Some(rank) = definition.rank_of(fqn) else {
            continue;
        };
        for lower in definition.value_fqns().into_iter().skip(rank + 1) {
            if seen.insert(lower.clone()) {
                expanded.push(lower);
            }
        }
    }
    Ok(expanded)
}
