//! # warden-entitlements: Entitlement resolution
//!
//! Computes the attribute-value FQNs each entity holds, by evaluating the
//! subject mappings attached to the values in scope.
//!
//! ```text
//! scope FQNs ──► AttributeStore (paged, with subject mappings)
//!                      │
//! entities ──► EntitlementsInput { entity, attribute_mappings, idp }
//!                      │
//!                      ▼
//!              PolicyEngine::evaluate("opentdf/entitlements/attributes")
//!                      │
//!                      ▼
//!              { entity_id: [value_fqn, ...] } ──► EntityEntitlements
//! ```
//!
//! [`SubjectMappingEngine`] is the built-in engine; any other engine that
//! answers [`ENTITLEMENTS_PATH`] with the same result shape can replace it.

mod engine;
mod error;
pub mod flatten;
mod resolver;
mod store;
pub mod subject_mapping;
mod token;

pub use engine::{ENTITLEMENTS_PATH, EntitlementsInput, IdpCredentials, PolicyEngine};
pub use error::{EntitlementsError, Result};
pub use resolver::EntitlementsResolver;
pub use store::{
    AttributeStore, AttributeValuesPage, AttributeValuesRequest, DEFAULT_PAGE_SIZE,
    InMemoryAttributeStore, fetch_attribute_values,
};
pub use subject_mapping::SubjectMappingEngine;
pub use token::{ClientCredentialsTokenSource, StaticTokenSource, TokenSource};
