//! # warden-pdp: Policy Decision Point
//!
//! Compares the attribute values attached to a piece of data against the
//! attribute values each entity is entitled to, under the rule of every
//! attribute definition the data touches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Data attribute values + entity entitlements │
//! │  + attribute definitions                     │
//! └─────────────────────┬────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │  determine_access                            │
//! │  ├─ Group data values by definition FQN      │
//! │  ├─ Dispatch on ALL_OF / ANY_OF / HIERARCHY  │
//! │  └─ Roll up per-definition results           │
//! └─────────────────────┬────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │  Decision per entity                         │
//! │  - access (AND over definitions)             │
//! │  - DataRuleResults with ValueFailures        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ```
//! use std::collections::BTreeMap;
//! use warden_pdp::determine_access;
//! use warden_types::{AttributeDefinition, AttributeRule, AttributeValue};
//!
//! let fqn = "https://www.example.org/attr/foo/value/value1";
//! let definition = AttributeDefinition {
//!     namespace: "www.example.org".to_string(),
//!     name: "foo".to_string(),
//!     rule: AttributeRule::AllOf,
//!     values: vec![AttributeValue { value: "value1".to_string(), ..AttributeValue::from_fqn(fqn) }],
//!     ..AttributeDefinition::default()
//! };
//!
//! let mut entities = BTreeMap::new();
//! entities.insert("e1".to_string(), vec![fqn.to_string()]);
//!
//! let decisions = determine_access(&[AttributeValue::from_fqn(fqn)], &entities, &[definition]).unwrap();
//! assert!(decisions["e1"].access);
//! ```
//!
//! Diagnostic results are for logs and audit. Callers that answer data
//! requesters only report the rolled-up `access` bit.

mod decision;
mod error;
pub mod evaluator;

pub use decision::{DataRuleResult, Decision, ValueFailure};
pub use error::{PdpError, Result};
pub use evaluator::determine_access;
