//! # Warden
//!
//! Attribute-based access control and key access for data-centric security.
//!
//! Data carries the attributes that govern it. Warden decides whether an
//! entity chain may access data with those attributes, and releases the
//! data's key only when it may.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Warden                              │
//! │  ┌─────────┐   ┌──────────────┐   ┌─────────┐   ┌─────────────┐  │
//! │  │   ERS   │ → │ Entitlements │ → │   PDP   │ → │     KAS     │  │
//! │  │(entities│   │ (subject     │   │(ALL_OF/ │   │ (rewrap via │  │
//! │  │ & chains│   │  mappings)   │   │ ANY_OF/ │   │  trust      │  │
//! │  │         │   │              │   │HIERARCHY│   │  layer)     │  │
//! │  └─────────┘   └──────────────┘   └─────────┘   └─────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use warden::{Platform, WardenConfig, init_tracing};
//!
//! let config = WardenConfig::load()?;
//! init_tracing(&config.logging)?;
//!
//! let platform = Platform::builder(&config)
//!     .with_attribute_store(store)
//!     .build()
//!     .await?;
//!
//! let responses = platform.authorization().get_decisions(&ctx, &requests).await?;
//! let rewrapped = platform.kas().rewrap(&ctx, &rewrap_request).await?;
//! ```

mod keyring;
mod platform;
mod telemetry;

// Wiring
pub use keyring::load_keyring;
pub use platform::{Platform, PlatformBuilder};
pub use telemetry::{env_filter, init_tracing};

// Configuration
pub use warden_config::{ConfigError, ConfigLoader, ErsMode, WardenConfig};

// Data model
pub use warden_types::{
    Action, AttributeDefinition, AttributeFqn, AttributeRule, AttributeValue, DecisionOutcome,
    DecisionRequest, DecisionResponse, Entity, EntityChain, EntityEntitlements, ErrorKind,
    KeyAlgorithm, KeyIdentifier, RequestContext, ResourceAttribute, Status, Token,
};

// Decision point
pub use warden_pdp::{Decision, determine_access};

// Entity resolution and entitlements
pub use warden_entitlements::{AttributeStore, InMemoryAttributeStore, PolicyEngine};
pub use warden_ers::EntityResolver;

// Authorization
pub use warden_authorization::{
    AuthorizationError, AuthorizationService, EntitlementsRequest, TokenDecisionRequest,
};

// Key access
pub use warden_kas::{
    KasError, KeyAccessObject, KeyAccessResult, KeyAccessServer, RewrapRequest, RewrapResponse,
};
pub use warden_trust::{DelegatingKeyService, KeyIndex, KeyManager, WrappedKeyStore};
pub use warden_crypto::{Encapsulator, encapsulator_from_public_pem};
