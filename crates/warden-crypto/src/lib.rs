//! # warden-crypto: primitives for key wrapping and policy binding
//!
//! Thin, typed wrappers over the RustCrypto crates:
//!
//! - [`aead`]: AES-256-GCM with nonce-prefixed blobs and explicit IV/tag sizes
//! - [`kdf`]: HKDF-SHA256, the TDF and NanoTDF salts, HMAC policy bindings
//! - [`rsa`]: RSA-OAEP (SHA-1) decryption and encryption
//! - [`ec`]: P-256/P-384/P-521 keys and ECDH
//! - [`ecies`]: salted ECDH + HKDF + AES-GCM key encapsulation
//! - [`pem`]: PEM framing
//!
//! The [`Encapsulator`] trait is the only way a raw key leaves the trust
//! boundary: it re-wraps bytes under a caller-supplied public key.

pub mod aead;
pub mod ec;
pub mod ecies;
mod encapsulator;
mod error;
pub mod kdf;
pub mod pem;
pub mod rsa;

pub use encapsulator::{Encapsulator, encapsulator_from_public_pem};
pub use error::{CryptoError, Result};
