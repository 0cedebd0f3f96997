//! # warden-trust: Key trust layer
//!
//! Locates wrapping keys and performs private-key operations without letting
//! raw key bytes escape.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   DelegatingKeyService                    │
//! │  find_key_by_id ──► KeyIndex                              │
//! │  decrypt / derive_key ──► KeyManager chosen by key.system │
//! └──────────────┬───────────────────────────┬────────────────┘
//!                │                           │
//!     ┌──────────▼──────────┐     ┌──────────▼──────────┐
//!     │  InProcessProvider  │     │    BasicManager     │
//!     │  (keyring in memory)│     │ (root-key wrapped)  │
//!     └─────────────────────┘     └─────────────────────┘
//!                │                           │
//!                └──────────► ProtectedKey ◄─┘
//!                   verify_binding / export / decrypt_aes_gcm
//! ```
//!
//! Managers are built lazily from factories registered by system name, and
//! a key whose system has no factory is handled by the default manager.

mod basic;
mod delegating;
mod error;
mod in_process;
mod key;
mod service;
mod unwrap;

pub use basic::{
    BASIC_SYSTEM, BasicManager, InMemoryKeyStore, StoreKeyIndex, WrappedKey, WrappedKeyStore,
    wrap_private_key,
};
pub use delegating::{DelegatingKeyService, KeyManagerFactory, KeyManagerFactoryOptions};
pub use error::{Result, TrustError};
pub use in_process::{IN_PROCESS_SYSTEM, InProcessProvider, KeyringEntry, consolidate_keyring};
pub use key::{KeyDetails, ProtectedKey};
pub use service::{KeyIndex, KeyManager, ListKeyOptions};

#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::OnceLock;

    use warden_crypto::ec::EcPrivateKey;
    use warden_crypto::rsa::RsaDecryptor;
    use warden_types::EcCurve;

    // RSA generation is slow in debug builds; share one key per process.
    pub fn rsa_pem() -> &'static str {
        static PEM: OnceLock<String> = OnceLock::new();
        PEM.get_or_init(|| {
            RsaDecryptor::generate(2048)
                .unwrap()
                .private_key_pem()
                .unwrap()
                .to_string()
        })
    }

    pub fn ec_pem() -> &'static str {
        static PEM: OnceLock<String> = OnceLock::new();
        PEM.get_or_init(|| EcPrivateKey::generate(EcCurve::P256).to_pem().unwrap().to_string())
    }
}
