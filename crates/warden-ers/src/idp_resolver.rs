//! Resolver backed by an identity provider.
//!
//! ```text
//! ClientId  ──► clients(clientId) ──► [records] | inferred | []
//! UserName  ──► users(username)   ──► [user]    | inferred | NotFound
//! Email     ──► users(email)      ──► [user]
//!                  └─ miss ──► groups(email) ──► members of the one group
//!                                  └─ miss ──► inferred | NotFound
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info};
use warden_types::{Entity, EntityCategory, EntityKind, EntityRepresentation, RequestContext};

use crate::error::{ErsError, Result};
use crate::idp::{IdentityProvider, IdpRecord, UserQuery};
use crate::jwt::{self, CLIENT_SELECTOR, USERNAME_SELECTOR};
use crate::keycloak::InferId;
use crate::resolver::{ENTITY_ID_PREFIX, EntityResolver, original_id};

const SERVICE_ACCOUNT_PREFIX: &str = "service-account-";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdpResolverOptions {
    pub infer_id: InferId,
    /// Expand members of sub-groups recursively.
    pub sub_groups: bool,
}

#[derive(Debug, Clone)]
pub struct IdpResolver {
    idp: Arc<dyn IdentityProvider>,
    options: IdpResolverOptions,
}

impl IdpResolver {
    pub fn new(idp: Arc<dyn IdentityProvider>) -> Self {
        Self {
            idp,
            options: IdpResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: IdpResolverOptions) -> Self {
        self.options = options;
        self
    }

    async fn resolve_one(&self, ctx: &RequestContext, entity: &Entity) -> Result<Vec<IdpRecord>> {
        debug!(entity = entity.kind.tag(), id = %entity.ephemeral_id, "lookup");
        match &entity.kind {
            EntityKind::ClientId(client_id) => {
                let clients = self.idp.get_clients(ctx, client_id).await?;
                if clients.is_empty() && self.options.infer_id.client_id {
                    debug!(client_id, "no client found, inferring entity");
                    return Ok(vec![entity.to_structured()]);
                }
                Ok(clients)
            }
            EntityKind::UserName(username) => {
                let users = self.idp.get_users(ctx, UserQuery::Username(username)).await?;
                if users.len() == 1 {
                    return Ok(users);
                }
                error!(username, found = users.len(), "no unique user found");
                if self.options.infer_id.username {
                    return Ok(vec![entity.to_structured()]);
                }
                Err(ErsError::NotFound {
                    entity: username.clone(),
                })
            }
            EntityKind::EmailAddress(email) => {
                let users = self.idp.get_users(ctx, UserQuery::Email(email)).await?;
                if users.len() == 1 {
                    return Ok(users);
                }
                error!(email, found = users.len(), "no unique user found, trying groups");

                let groups = self.idp.search_groups(ctx, email).await?;
                if let [group] = groups.as_slice() {
                    info!(email, group = %group.id, "group found for entity");
                    return self.expand_group(ctx, &group.id).await.map_err(|e| match e {
                        ErsError::Cancelled(c) => ErsError::Cancelled(c),
                        other => {
                            error!(email, error = %other, "group expansion failed");
                            ErsError::NotFound {
                                entity: email.clone(),
                            }
                        }
                    });
                }
                error!(email, found = groups.len(), "no unique group found");
                if self.options.infer_id.email || self.options.infer_id.username {
                    return Ok(vec![entity.to_structured()]);
                }
                Err(ErsError::NotFound {
                    entity: email.clone(),
                })
            }
            EntityKind::Claims(Value::Object(claims)) => Ok(vec![claims.clone()]),
            EntityKind::Claims(_) => Err(ErsError::InvalidArgument(
                "claims entity is not an object".to_string(),
            )),
        }
    }

    /// Members of `group_id`, and of every sub-group when enabled, deduplicated
    /// by record id in first-seen order.
    async fn expand_group(&self, ctx: &RequestContext, group_id: &str) -> Result<Vec<IdpRecord>> {
        let mut members = Vec::new();
        let mut seen_members = HashSet::new();
        let mut seen_groups = HashSet::from([group_id.to_string()]);
        let mut pending = vec![group_id.to_string()];

        while let Some(current) = pending.pop() {
            info!(group = %current, "expanding group");
            for member in self.idp.get_group_members(ctx, &current).await? {
                let id = member.get("id").and_then(Value::as_str).map(str::to_string);
                let fresh = match id {
                    Some(id) => seen_members.insert(id),
                    None => true,
                };
                if fresh {
                    members.push(member);
                }
            }
            if self.options.sub_groups {
                let children = self.idp.get_sub_groups(ctx, &current).await?;
                // Reverse so the first child is expanded next.
                for child in children.into_iter().rev() {
                    if seen_groups.insert(child.id.clone()) {
                        pending.push(child.id);
                    }
                }
            }
        }
        debug!(group = group_id, members = members.len(), "group expanded");
        Ok(members)
    }

    /// The client id of the service account behind `username`, if exactly one
    /// client matches.
    async fn service_account_client(&self, ctx: &RequestContext, username: &str) -> Result<Option<String>> {
        let expected = username.trim_start_matches(SERVICE_ACCOUNT_PREFIX);
        let clients = self.idp.get_clients(ctx, expected).await?;
        match clients.as_slice() {
            [client] => {
                let client_id = client
                    .get("clientId")
                    .and_then(Value::as_str)
                    .unwrap_or(expected)
                    .to_string();
                debug!(client_id, "service account client found");
                Ok(Some(client_id))
            }
            [] => {
                debug!(client_id = expected, "no client found, likely not a service account");
                Ok(None)
            }
            _ => {
                error!(client_id = expected, "more than one client found");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl EntityResolver for IdpResolver {
    async fn resolve_entities(
        &self,
        ctx: &RequestContext,
        entities: &[Entity],
    ) -> Result<Vec<EntityRepresentation>> {
        let mut resolved = Vec::with_capacity(entities.len());
        for (idx, entity) in entities.iter().enumerate() {
            let additional_props = self.resolve_one(ctx, entity).await?;
            resolved.push(EntityRepresentation {
                original_id: original_id(entity, idx),
                additional_props,
            });
        }
        Ok(resolved)
    }

    async fn entities_from_jwt(&self, ctx: &RequestContext, token: &str) -> Result<Vec<Entity>> {
        let claims = jwt::parse_claims(token)?;
        let client_id = jwt::string_claim(&claims, CLIENT_SELECTOR)?;
        let username = jwt::string_claim(&claims, USERNAME_SELECTOR)?;

        let mut entities = vec![
            Entity::client_id(client_id)
                .with_category(EntityCategory::Environment)
                .with_ephemeral_id(format!("{ENTITY_ID_PREFIX}0-clientid-{client_id}")),
        ];

        let service_account = if username.starts_with(SERVICE_ACCOUNT_PREFIX) {
            self.service_account_client(ctx, username).await?
        } else {
            None
        };
        entities.push(match service_account {
            Some(sa_client) => Entity::client_id(sa_client.as_str())
                .with_ephemeral_id(format!("{ENTITY_ID_PREFIX}1-clientid-{sa_client}")),
            None => Entity::user_name(username)
                .with_ephemeral_id(format!("{ENTITY_ID_PREFIX}1-username-{username}")),
        });
        Ok(entities)
    }
}
