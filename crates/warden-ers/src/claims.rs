//! Resolver that trusts token claims instead of querying an IdP.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use warden_types::{Entity, EntityKind, EntityRepresentation, RequestContext};

use crate::error::{ErsError, Result};
use crate::jwt;
use crate::resolver::{EntityResolver, original_id};

/// Ephemeral id of the entity built from a token's claims.
pub const CLAIMS_ENTITY_ID: &str = "jwtentity-claims";

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsResolver;

impl ClaimsResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EntityResolver for ClaimsResolver {
    async fn resolve_entities(
        &self,
        ctx: &RequestContext,
        entities: &[Entity],
    ) -> Result<Vec<EntityRepresentation>> {
        ctx.check()?;
        entities
            .iter()
            .enumerate()
            .map(|(idx, entity)| {
                let props = match &entity.kind {
                    EntityKind::Claims(Value::Object(claims)) => claims.clone(),
                    EntityKind::Claims(other) => {
                        return Err(ErsError::InvalidArgument(format!(
                            "claims for entity {} are not an object: {other}",
                            original_id(entity, idx)
                        )));
                    }
                    _ => entity.to_structured(),
                };
                Ok(EntityRepresentation {
                    original_id: original_id(entity, idx),
                    additional_props: vec![props],
                })
            })
            .collect()
    }

    async fn entities_from_jwt(&self, ctx: &RequestContext, jwt: &str) -> Result<Vec<Entity>> {
        ctx.check()?;
        let claims = jwt::parse_claims(jwt)?;
        debug!(claims = claims.len(), "built claims entity from jwt");
        Ok(vec![
            Entity::claims(Value::Object(claims)).with_ephemeral_id(CLAIMS_ENTITY_ID),
        ])
    }
}
