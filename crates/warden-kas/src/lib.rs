//! # warden-kas: Key Access Service
//!
//! Releases data keys to entitled requesters without the raw key ever
//! leaving the trust layer.
//!
//! ```text
//! RewrapRequest { client key, token, key access objects }
//!        │
//!        ├─► ERS ──► entity chain            (once per request)
//!        ├─► session encapsulator            (once per request)
//!        ▼
//! for each key access object:
//!   policy ─► resource context ─► entitlements ─► decide_chain
//!        │                                           │
//!        │                                  PERMIT   │   DENY ─► Fail(forbidden)
//!        ▼                                           ▼
//!   decrypt / derive_key ─► verify_binding ─► export(session) ─► Permit
//! ```
//!
//! Policy binding mismatches never release the key and surface as
//! `Fail(bad request)`.

mod error;
mod policy;
mod request;
mod rewrap;
mod state;

pub use error::{KasError, Result};
pub use policy::{Policy, PolicyAttribute, PolicyBody, decode_binding};
pub use request::{
    FailureReason, KeyAccess, KeyAccessObject, KeyAccessResult, NanoKeyAccess, NanoPolicy,
    RewrapRequest, RewrapResponse, WrappedKeyAccess,
};
pub use rewrap::KeyAccessServer;
pub use state::RewrapState;
