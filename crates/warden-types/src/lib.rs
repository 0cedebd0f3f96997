//! # warden-types: Core types for `Warden`
//!
//! This crate contains the data model shared by every Warden component:
//! - Fully-qualified names ([`AttributeFqn`], [`build_fqn`], [`definition_fqn_from_value_fqn`])
//! - Attribute policy ([`AttributeDefinition`], [`AttributeValue`], [`AttributeRule`])
//! - Subject mappings ([`SubjectMapping`], [`SubjectConditionSet`], [`Condition`])
//! - Entities ([`Entity`], [`EntityKind`], [`EntityChain`], [`EntityRepresentation`])
//! - Decision requests and responses ([`DecisionRequest`], [`DecisionResponse`])
//! - Key metadata ([`KeyAlgorithm`], [`EcCurve`], [`KeyIdentifier`])
//! - Error taxonomy ([`ErrorKind`], [`Status`])
//! - Request scoping ([`RequestContext`])

mod attribute;
mod context;
mod decision;
mod entity;
mod error;
pub mod fqn;
mod key;
mod subject_mapping;

pub use attribute::{AttributeAndValue, AttributeDefinition, AttributeRule, AttributeValue};
pub use context::{Cancelled, RequestContext};
pub use decision::{
    Action, DecisionOutcome, DecisionRequest, DecisionResponse, EntityEntitlements,
    ResourceAttribute,
};
pub use entity::{
    Entity, EntityCategory, EntityChain, EntityKind, EntityRepresentation, Token,
    assign_ephemeral_ids,
};
pub use error::{ErrorKind, Status};
pub use fqn::{AttributeFqn, FqnError, build_fqn, canonicalize, definition_fqn_from_value_fqn};
pub use key::{EcCurve, KeyAlgorithm, KeyIdentifier, ParseAlgorithmError};
pub use subject_mapping::{
    BooleanOperator, Condition, ConditionGroup, SubjectConditionSet, SubjectMapping,
    SubjectMappingOperator, SubjectSet,
};
