//! # warden-authorization: Access decisions
//!
//! Ties the entity resolution service, the entitlements resolver and the
//! policy decision point together.
//!
//! ```text
//! DecisionRequest ─┬─► resource attributes ──► definitions + pertinent scope
//!                  │                                   │
//!                  └─► entity chains ──► entitlements ◄┘
//!                                             │
//!                                             ▼
//!                                     determine_access
//!                                             │
//!                                             ▼
//!                      PERMIT iff every entity of the chain has access
//! ```
//!
//! Token requests build their entity chains through the ERS first.

mod error;
mod request;
mod service;

pub use error::{AuthorizationError, Result};
pub use request::{EntitlementsRequest, TokenDecisionRequest};
pub use service::{AuthorizationService, ResourceContext, decide_chain};
