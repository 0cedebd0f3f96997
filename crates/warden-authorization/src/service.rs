//! The authorization service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};
use warden_entitlements::{EntitlementsResolver, fetch_attribute_values};
use warden_ers::EntityResolver;
use warden_pdp::determine_access;
use warden_types::{
    AttributeDefinition, AttributeRule, AttributeValue, DecisionOutcome, DecisionRequest,
    DecisionResponse, EntityChain, EntityEntitlements, RequestContext, ResourceAttribute,
    canonicalize,
};

use crate::error::{AuthorizationError, Result};
use crate::request::{EntitlementsRequest, TokenDecisionRequest};

/// Everything needed to decide on one resource attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContext {
    pub resource: ResourceAttribute,
    /// Definitions touched by the resource, each once, with FQNs populated.
    pub definitions: Vec<AttributeDefinition>,
    /// The resource's values, in request order.
    pub data_values: Vec<AttributeValue>,
    /// Entitlement scope: the resource's FQNs plus every value of each
    /// hierarchy definition it touches.
    pub pertinent: ResourceAttribute,
}

#[derive(Debug, Clone)]
pub struct AuthorizationService {
    ers: Arc<dyn EntityResolver>,
    entitlements: EntitlementsResolver,
    comprehensive_hierarchy: bool,
}

impl AuthorizationService {
    pub fn new(ers: Arc<dyn EntityResolver>, entitlements: EntitlementsResolver) -> Self {
        Self {
            ers,
            entitlements,
            comprehensive_hierarchy: false,
        }
    }

    /// Used by `get_entitlements` when a request leaves
    /// `with_comprehensive_hierarchy` unset.
    pub fn with_comprehensive_hierarchy(mut self, enabled: bool) -> Self {
        self.comprehensive_hierarchy = enabled;
        self
    }

    pub fn ers(&self) -> &Arc<dyn EntityResolver> {
        &self.ers
    }

    /// One response per (resource attribute, entity chain) pair, resource
    /// attributes outermost. The first failure aborts the whole batch.
    pub async fn get_decisions(
        &self,
        ctx: &RequestContext,
        requests: &[DecisionRequest],
    ) -> Result<Vec<DecisionResponse>> {
        debug!(requests = requests.len(), "getting decisions");
        let mut responses = Vec::new();
        for request in requests {
            let action = request.actions.first().cloned().unwrap_or_default();
            for resource in &request.resource_attributes {
                let context = self.resource_context(ctx, resource).await?;
                for chain in &request.entity_chains {
                    let entitlements = self.chain_entitlements(ctx, chain, &context).await?;
                    let decision = decide_chain(chain, &context, &entitlements)?;
                    let resource_attributes_id = resource.response_id();
                    debug!(
                        chain_id = %chain.ephemeral_id,
                        resource_id = %resource_attributes_id,
                        decision = ?decision,
                        "decision"
                    );
                    responses.push(DecisionResponse {
                        decision,
                        entity_chain_id: chain.ephemeral_id.clone(),
                        resource_attributes_id,
                        action: action.clone(),
                        obligations: Vec::new(),
                    });
                }
            }
        }
        Ok(responses)
    }

    /// Builds an entity chain from each token, then decides as [`Self::get_decisions`].
    pub async fn get_decisions_by_token(
        &self,
        ctx: &RequestContext,
        requests: &[TokenDecisionRequest],
    ) -> Result<Vec<DecisionResponse>> {
        let mut decision_requests = Vec::with_capacity(requests.len());
        for request in requests {
            let entity_chains = self
                .ers
                .create_entity_chains_from_tokens(ctx, &request.tokens)
                .await?;
            decision_requests.push(DecisionRequest {
                actions: request.actions.clone(),
                entity_chains,
                resource_attributes: request.resource_attributes.clone(),
            });
        }
        self.get_decisions(ctx, &decision_requests).await
    }

    pub async fn get_entitlements(
        &self,
        ctx: &RequestContext,
        request: &EntitlementsRequest,
    ) -> Result<Vec<EntityEntitlements>> {
        debug!(entities = request.entities.len(), "getting entitlements");
        Ok(self
            .entitlements
            .get_entitlements(
                ctx,
                &request.entities,
                request.scope.as_ref(),
                request
                    .with_comprehensive_hierarchy
                    .unwrap_or(self.comprehensive_hierarchy),
            )
            .await?)
    }

    /// Looks up the definitions behind `resource` and computes the
    /// entitlement scope.
    pub async fn resource_context(
        &self,
        ctx: &RequestContext,
        resource: &ResourceAttribute,
    ) -> Result<ResourceContext> {
        debug!(fqns = ?resource.attribute_value_fqns, "getting resource attributes");
        let fqns: Vec<String> = resource
            .attribute_value_fqns
            .iter()
            .map(|f| canonicalize(f))
            .collect();
        let found =
            fetch_attribute_values(self.entitlements.store().as_ref(), ctx, &fqns, false).await?;

        let mut definitions: Vec<AttributeDefinition> = Vec::new();
        let mut seen = BTreeSet::new();
        let mut data_values = Vec::with_capacity(fqns.len());
        for fqn in &fqns {
            let mapped = found
                .get(fqn)
                .ok_or_else(|| AuthorizationError::MissingAttributeValue(fqn.clone()))?;
            let mut definition = mapped.attribute.clone();
            definition.populate_fqns()?;
            let mut value = mapped.value.clone();
            if value.fqn.is_empty() {
                value.fqn = fqn.clone();
            }
            data_values.push(value);
            if seen.insert(definition.definition_fqn()?) {
                definitions.push(definition);
            }
        }

        let mut pertinent = resource.clone();
        for definition in &definitions {
            if definition.rule == AttributeRule::Hierarchy {
                pertinent
                    .attribute_value_fqns
                    .extend(definition.value_fqns());
            }
        }
        Ok(ResourceContext {
            resource: resource.clone(),
            definitions,
            data_values,
            pertinent,
        })
    }

    /// Entitlements for every entity of `chain`, keyed by entity id.
    ///
    /// An empty chain or an empty resource has nothing to evaluate and
    /// yields an empty map.
    pub async fn chain_entitlements(
        &self,
        ctx: &RequestContext,
        chain: &EntityChain,
        context: &ResourceContext,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        if chain.entities.is_empty() || context.pertinent.attribute_value_fqns.is_empty() {
            warn!(chain_id = %chain.ephemeral_id, "empty entity list and/or entity data attribute list");
            return Ok(BTreeMap::new());
        }
        let entitlements = self
            .entitlements
            .get_entitlements(ctx, &chain.entities, Some(&context.pertinent), false)
            .await?;
        Ok(entitlements
            .into_iter()
            .map(|e| (e.entity_id, e.attribute_value_fqns))
            .collect())
    }
}

/// PERMIT iff every entity of the chain is granted access.
///
/// A chain without entities is denied unless the resource carries no
/// attributes, which is permitted.
pub fn decide_chain(
    chain: &EntityChain,
    context: &ResourceContext,
    entitlements: &BTreeMap<String, Vec<String>>,
) -> Result<DecisionOutcome> {
    if context.data_values.is_empty() {
        return Ok(DecisionOutcome::Permit);
    }
    if chain.entities.is_empty() {
        return Ok(DecisionOutcome::Deny);
    }
    let decisions = determine_access(&context.data_values, entitlements, &context.definitions)?;
    let permitted = !decisions.is_empty() && decisions.values().all(|d| d.access);
    Ok(if permitted {
        DecisionOutcome::Permit
    } else {
        DecisionOutcome::Deny
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use test_case::test_case;
    use warden_entitlements::{
        ENTITLEMENTS_PATH, EntitlementsInput, InMemoryAttributeStore, PolicyEngine,
    };
    use warden_ers::ClaimsResolver;
    use warden_types::{Action, Entity, EntityCategory, Token};

    /// Helper: engine that entitles each entity id to a fixed list.
    #[derive(Debug)]
    struct FixedEntitlements(BTreeMap<String, Vec<String>>);

    #[async_trait]
    impl PolicyEngine for FixedEntitlements {
        async fn evaluate(
            &self,
            ctx: &RequestContext,
            path: &str,
            input: Value,
        ) -> warden_entitlements::Result<Value> {
            ctx.check()?;
            assert_eq!(path, ENTITLEMENTS_PATH);
            let input = EntitlementsInput::from_value(input)?;
            let id = input.entity.ephemeral_id;
            let fqns = self.0.get(&id).cloned().unwrap_or_default();
            Ok(json!({ id: fqns }))
        }
    }

    const FOO1: &str = "https://www.example.org/attr/foo/value/value1";
    const FOO2: &str = "https://www.example.org/attr/foo/value/value2";
    const TOP: &str = "https://www.example.org/attr/level/value/top";
    const MID: &str = "https://www.example.org/attr/level/value/mid";
    const LOW: &str = "https://www.example.org/attr/level/value/low";

    fn definition(name: &str, rule: AttributeRule, values: &[&str]) -> AttributeDefinition {
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

    fn service(entitled: &[(&str, &[&str])]) -> AuthorizationService {
        let store = InMemoryAttributeStore::new([
            definition("foo", AttributeRule::AllOf, &["value1", "value2"]),
            definition("level", AttributeRule::Hierarchy, &["top", "mid", "low"]),
        ])
        .unwrap();
        let engine = FixedEntitlements(
            entitled
                .iter()
                .map(|(id, fqns)| ((*id).to_string(), fqns.iter().map(ToString::to_string).collect()))
                .collect(),
        );
        let ers: Arc<dyn EntityResolver> = Arc::new(ClaimsResolver::new());
        AuthorizationService::new(
            ers,
            EntitlementsResolver::new(Arc::new(store), Arc::new(engine)),
        )
    }

    fn chain(id: &str, entities: Vec<Entity>) -> EntityChain {
        EntityChain {
            ephemeral_id: id.to_string(),
            entities,
        }
    }

    fn subject(id: &str) -> Entity {
        Entity::email(format!("{id}@example.org")).with_ephemeral_id(id)
    }

    async fn decide(service: &AuthorizationService, chain: EntityChain, data: &[&str]) -> DecisionResponse {
        let request = DecisionRequest {
            actions: vec![Action::Decrypt],
            entity_chains: vec![chain],
            resource_attributes: vec![ResourceAttribute::new(data.iter().copied())],
        };
        let mut responses = service
            .get_decisions(&RequestContext::new(), &[request])
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        responses.remove(0)
    }

    #[test_case(&[FOO1], &[FOO1], DecisionOutcome::Permit ; "all of pass")]
    #[test_case(&[FOO1], &[FOO1, FOO2], DecisionOutcome::Deny ; "all of missing one value")]
    #[test_case(&[TOP], &[MID], DecisionOutcome::Permit ; "hierarchy higher rank grants lower")]
    #[test_case(&[TOP, MID], &[MID, TOP], DecisionOutcome::Deny ; "hierarchy lower entity value disqualifies")]
    #[test_case(&[LOW], &[MID], DecisionOutcome::Deny ; "hierarchy lower rank denied")]
    #[tokio::test]
    async fn single_subject(entitled: &[&str], data: &[&str], expected: DecisionOutcome) {
        let service = service(&[("e1", entitled)]);
        let response = decide(&service, chain("ec1", vec![subject("e1")]), data).await;
        assert_eq!(response.decision, expected);
        assert_eq!(response.entity_chain_id, "ec1");
        assert_eq!(response.action, Action::Decrypt);
    }

    #[tokio::test]
    async fn environment_entitlement_alone_is_insufficient() {
        let service = service(&[("e2", &[FOO1])]);
        let environment = Entity::client_id("svc")
            .with_ephemeral_id("e2")
            .with_category(EntityCategory::Environment);
        let response = decide(&service, chain("ec1", vec![subject("e1"), environment]), &[FOO1]).await;
        assert_eq!(response.decision, DecisionOutcome::Deny);
    }

    #[tokio::test]
    async fn every_entity_entitled_permits() {
        let service = service(&[("e1", &[FOO1]), ("e2", &[FOO1])]);
        let environment = Entity::client_id("svc")
            .with_ephemeral_id("e2")
            .with_category(EntityCategory::Environment);
        let response = decide(&service, chain("ec1", vec![subject("e1"), environment]), &[FOO1]).await;
        assert_eq!(response.decision, DecisionOutcome::Permit);
    }

    #[tokio::test]
    async fn empty_chain_denies_and_empty_resource_permits() {
        let service = service(&[]);
        let response = decide(&service, chain("empty", Vec::new()), &[FOO1]).await;
        assert_eq!(response.decision, DecisionOutcome::Deny);

        let response = decide(&service, chain("ec1", vec![subject("e1")]), &[]).await;
        assert_eq!(response.decision, DecisionOutcome::Permit);
    }

    #[tokio::test]
    async fn responses_cover_every_pair_in_order() {
        let service = service(&[("e1", &[FOO1])]);
        let request = DecisionRequest {
            actions: Vec::new(),
            entity_chains: vec![chain("a", vec![subject("e1")]), chain("b", vec![subject("e9")])],
            resource_attributes: vec![
                ResourceAttribute::new([FOO1]).with_id("ra-1"),
                ResourceAttribute::new([FOO2]),
            ],
        };
        let responses = service
            .get_decisions(&RequestContext::new(), &[request])
            .await
            .unwrap();
        let summary: Vec<_> = responses
            .iter()
            .map(|r| (r.resource_attributes_id.as_str(), r.entity_chain_id.as_str(), r.decision))
            .collect();
        assert_eq!(
            summary,
            [
                ("ra-1", "a", DecisionOutcome::Permit),
                ("ra-1", "b", DecisionOutcome::Deny),
                (FOO2, "a", DecisionOutcome::Deny),
                (FOO2, "b", DecisionOutcome::Deny),
            ]
        );
        assert_eq!(responses[0].action, Action::Transmit);
    }

    #[tokio::test]
    async fn unknown_resource_fqn_aborts_batch() {
        let service = service(&[("e1", &[FOO1])]);
        let request = DecisionRequest {
            actions: Vec::new(),
            entity_chains: vec![chain("a", vec![subject("e1")])],
            resource_attributes: vec![
                ResourceAttribute::new([FOO1]),
                ResourceAttribute::new(["https://www.example.org/attr/foo/value/nope"]),
            ],
        };
        let err = service
            .get_decisions(&RequestContext::new(), &[request])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), warden_types::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn hierarchy_scope_includes_every_rank() {
        let service = service(&[]);
        let context = service
            .resource_context(&RequestContext::new(), &ResourceAttribute::new(["https://www.example.org/attr/level/value/MID"]))
            .await
            .unwrap();
        assert_eq!(context.definitions.len(), 1);
        assert_eq!(context.data_values[0].fqn, MID);
        assert_eq!(
            context.pertinent.attribute_value_fqns,
            ["https://www.example.org/attr/level/value/MID", TOP, MID, LOW]
        );
    }

    #[tokio::test]
    async fn decisions_by_token_use_token_ids() {
        let service = service(&[("jwtentity-claims", &[FOO1])]);
        let jwt = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &json!({"sub": "alice"}),
            &jsonwebtoken::EncodingKey::from_secret(b"k"),
        )
        .unwrap();
        let request = TokenDecisionRequest {
            actions: vec![Action::Decrypt],
            tokens: vec![Token {
                id: "tok-1".into(),
                jwt,
            }],
            resource_attributes: vec![ResourceAttribute::new([FOO1])],
        };
        let responses = service
            .get_decisions_by_token(&RequestContext::new(), &[request])
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].entity_chain_id, "tok-1");
        assert_eq!(responses[0].decision, DecisionOutcome::Permit);
    }

    #[tokio::test]
    async fn entitlements_require_scope() {
        let service = service(&[("e1", &[FOO1])]);
        let request = EntitlementsRequest {
            entities: vec![subject("e1")],
            scope: None,
            with_comprehensive_hierarchy: None,
        };
        let err = service
            .get_entitlements(&RequestContext::new(), &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), warden_types::ErrorKind::InvalidArgument);

        let request = EntitlementsRequest {
            scope: Some(ResourceAttribute::new([FOO1])),
            ..request
        };
        let entitlements = service
            .get_entitlements(&RequestContext::new(), &request)
            .await
            .unwrap();
        assert_eq!(entitlements[0].attribute_value_fqns, [FOO1]);
    }
}
