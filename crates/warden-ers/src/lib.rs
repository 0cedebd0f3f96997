//! # warden-ers: Entity resolution
//!
//! Turns bearer tokens into entity chains and entities into the structured
//! representations that subject mappings are evaluated against.
//!
//! ```text
//! Token ──► EntityResolver::create_entity_chain_from_jwt ──► EntityChain
//! Entity ─► EntityResolver::resolve_entities ──────────────► EntityRepresentation
//!
//!   ClaimsResolver   trusts the token's claims as-is
//!   IdpResolver      looks entities up through an IdentityProvider
//!                        └─ CachedIdentityProvider ─► KeycloakClient ─► ClientCredentials
//! ```

mod claims;
mod error;
mod idp;
mod idp_resolver;
pub mod jwt;
mod keycloak;
mod oauth;
mod resolver;
#[cfg(test)]
mod test_server;

pub use claims::{CLAIMS_ENTITY_ID, ClaimsResolver};
pub use error::{ErsError, Result};
pub use idp::{CachedIdentityProvider, IdentityProvider, IdpGroup, IdpRecord, UserQuery};
pub use idp_resolver::{IdpResolver, IdpResolverOptions};
pub use keycloak::{InferId, KeycloakClient, KeycloakConfig};
pub use oauth::{ClientCredentials, DEFAULT_TOKEN_BUFFER};
pub use resolver::{ENTITY_ID_PREFIX, EntityResolver};
