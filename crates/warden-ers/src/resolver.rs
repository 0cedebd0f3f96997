//! The entity resolver interface.

use std::fmt::Debug;

use async_trait::async_trait;
use warden_types::{Entity, EntityChain, EntityRepresentation, RequestContext, Token};

use crate::error::Result;

/// Prefix for ephemeral ids synthesized from tokens.
pub const ENTITY_ID_PREFIX: &str = "jwtentity-";

/// The `originalId` reported for the entity at `idx`.
pub(crate) fn original_id(entity: &Entity, idx: usize) -> String {
    if entity.ephemeral_id.is_empty() {
        format!("{ENTITY_ID_PREFIX}{idx}")
    } else {
        entity.ephemeral_id.clone()
    }
}

#[async_trait]
pub trait EntityResolver: Send + Sync + Debug {
    /// One representation per input entity, in input order.
    async fn resolve_entities(
        &self,
        ctx: &RequestContext,
        entities: &[Entity],
    ) -> Result<Vec<EntityRepresentation>>;

    /// Entities named by a single bearer token.
    async fn entities_from_jwt(&self, ctx: &RequestContext, jwt: &str) -> Result<Vec<Entity>>;

    /// The entity chain for one token; the chain id is the token id.
    async fn create_entity_chain_from_jwt(
        &self,
        ctx: &RequestContext,
        token: &Token,
    ) -> Result<EntityChain> {
        Ok(EntityChain {
            ephemeral_id: token.id.clone(),
            entities: self.entities_from_jwt(ctx, &token.jwt).await?,
        })
    }

    /// One chain per token, in order. The first failing token fails the batch.
    async fn create_entity_chains_from_tokens(
        &self,
        ctx: &RequestContext,
        tokens: &[Token],
    ) -> Result<Vec<EntityChain>> {
        let mut chains = Vec::with_capacity(tokens.len());
        for token in tokens {
            chains.push(self.create_entity_chain_from_jwt(ctx, token).await?);
        }
        Ok(chains)
    }
}
