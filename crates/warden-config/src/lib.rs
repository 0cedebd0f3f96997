//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`WARDEN_*`, `__` between nested keys)
//! 2. warden.local.toml (not committed, local overrides)
//! 3. warden.toml (committed, project config)
//! 4. ~/.config/warden/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Durations are whole seconds. Byte sizes accept integers or strings such
//! as `"512mb"`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_cache::ByteSize;
use warden_types::KeyAlgorithm;

mod error;
mod loader;
mod paths;

pub use error::{ConfigError, Result};
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Warden configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub ers: ErsConfig,
    pub idp: IdpConfig,
    pub cache: CacheConfig,
    pub kas: KasConfig,
    pub entitlements: EntitlementsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErsMode {
    /// Entities come straight from token claims.
    #[default]
    Claims,
    /// Entities are looked up in Keycloak.
    Keycloak,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErsConfig {
    pub mode: ErsMode,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InferIdConfig {
    pub client_id: bool,
    pub email: bool,
    pub username: bool,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdpConfig {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub legacy_keycloak: bool,
    pub sub_groups: bool,
    pub infer_id: InferIdConfig,
    pub token_buffer_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            realm: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            legacy_keycloak: false,
            sub_groups: false,
            infer_id: InferIdConfig::default(),
            token_buffer_seconds: 120,
            request_timeout_seconds: 10,
        }
    }
}

impl IdpConfig {
    pub fn token_buffer(&self) -> Duration {
        Duration::from_secs(self.token_buffer_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl fmt::Debug for IdpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdpConfig")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("legacy_keycloak", &self.legacy_keycloak)
            .field("sub_groups", &self.sub_groups)
            .field("infer_id", &self.infer_id)
            .field("token_buffer_seconds", &self.token_buffer_seconds)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache entity resolution and key lookups.
    pub enabled: bool,
    pub max_cost: ByteSize,
    /// Zero disables expiry.
    pub expiration_seconds: u64,
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_cost: ByteSize(1 << 30),
            expiration_seconds: 60,
            shards: 16,
        }
    }
}

impl CacheConfig {
    pub fn expiration(&self) -> Option<Duration> {
        (self.expiration_seconds > 0).then(|| Duration::from_secs(self.expiration_seconds))
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KasConfig {
    /// Key manager used for keys whose system has no registered manager.
    pub default_manager: String,
    /// Hex-encoded 32-byte root key for wrapped private keys. Empty disables
    /// the root-key manager.
    pub root_key: String,
    pub keyring: Vec<KeyringConfig>,
}

impl Default for KasConfig {
    fn default() -> Self {
        Self {
            default_manager: "opentdf.io/in-process".to_string(),
            root_key: String::new(),
            keyring: Vec::new(),
        }
    }
}

impl fmt::Debug for KasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KasConfig")
            .field("default_manager", &self.default_manager)
            .field("root_key", &"[REDACTED]")
            .field("keyring", &self.keyring)
            .finish()
    }
}

/// A key loaded from disk into the in-process keyring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyringConfig {
    pub kid: String,
    /// `rsa:2048`, `rsa:4096` or `ec:secp256r1` and friends.
    pub alg: String,
    pub private_key_path: PathBuf,
    /// Public key PEM; derived from the private key when absent.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub legacy: bool,
}

fn default_true() -> bool {
    true
}

impl KeyringConfig {
    pub fn algorithm(&self) -> Result<KeyAlgorithm> {
        self.alg.parse().map_err(|e| {
            ConfigError::ValidationError(format!("keyring entry '{}': {e}", self.kid))
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementsConfig {
    /// Hand an IdP service token to the policy engine with every evaluation.
    pub send_idp_token: bool,
    /// Expand hierarchy entitlements to every lower rank by default.
    pub comprehensive_hierarchy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Checks cross-field requirements that deserialization cannot.
    pub fn validate(&self) -> Result<()> {
        if self.ers.mode == ErsMode::Keycloak {
            for (field, value) in [
                ("idp.url", &self.idp.url),
                ("idp.realm", &self.idp.realm),
                ("idp.client_id", &self.idp.client_id),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "{field} is required in keycloak mode"
                    )));
                }
            }
        }
        if self.entitlements.send_idp_token && self.idp.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "entitlements.send_idp_token requires idp.url".to_string(),
            ));
        }
        if self.cache.max_cost.bytes() == 0 {
            return Err(ConfigError::ValidationError(
                "cache.max_cost must be non-zero".to_string(),
            ));
        }
        if self.cache.shards == 0 {
            return Err(ConfigError::ValidationError(
                "cache.shards must be non-zero".to_string(),
            ));
        }

        let mut kids = HashSet::new();
        for entry in &self.kas.keyring {
            if entry.kid.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "keyring entries need a kid".to_string(),
                ));
            }
            entry.algorithm()?;
            if !kids.insert(entry.kid.as_str()) {
                tracing::debug!(kid = %entry.kid, "duplicate keyring kid; entries will be merged");
            }
        }
        Ok(())
    }

    /// Resolve relative key paths against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        for entry in &mut self.kas.keyring {
            if entry.private_key_path.is_relative() {
                entry.private_key_path = base.join(&entry.private_key_path);
            }
            if let Some(cert) = entry.cert_path.as_mut().filter(|p| p.is_relative()) {
                *cert = base.join(&*cert);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn keycloak() -> WardenConfig {
        let mut config = WardenConfig::default();
        config.ers.mode = ErsMode::Keycloak;
        config.idp.url = "https://idp.example.org".to_string();
        config.idp.realm = "opentdf".to_string();
        config.idp.client_id = "warden".to_string();
        config
    }

    fn keyring_entry(kid: &str, alg: &str) -> KeyringConfig {
        KeyringConfig {
            kid: kid.to_string(),
            alg: alg.to_string(),
            private_key_path: PathBuf::from("keys/kas.pem"),
            cert_path: None,
            active: true,
            legacy: false,
        }
    }

    #[test]
    fn defaults() {
        let config = WardenConfig::default();
        assert_eq!(config.ers.mode, ErsMode::Claims);
        assert_eq!(config.cache.max_cost, ByteSize(1 << 30));
        assert_eq!(config.cache.expiration(), Some(Duration::from_secs(60)));
        assert_eq!(config.idp.token_buffer(), Duration::from_secs(120));
        assert_eq!(config.kas.default_manager, "opentdf.io/in-process");
        config.validate().unwrap();
    }

    #[test]
    fn keycloak_mode_needs_connection() {
        keycloak().validate().unwrap();
        for field in ["url", "realm", "client_id"] {
            let mut config = keycloak();
            match field {
                "url" => config.idp.url.clear(),
                "realm" => config.idp.realm.clear(),
                _ => config.idp.client_id.clear(),
            }
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{err}");
        }
    }

    #[test_case("rsa:2048", true)]
    #[test_case("ec:secp384r1", true)]
    #[test_case("dsa:1024", false)]
    fn keyring_algorithm(alg: &str, valid: bool) {
        let mut config = WardenConfig::default();
        config.kas.keyring.push(keyring_entry("k1", alg));
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn keyring_kid_required() {
        let mut config = WardenConfig::default();
        config.kas.keyring.push(keyring_entry(" ", "rsa:2048"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_cache_cost_rejected() {
        let mut config = WardenConfig::default();
        config.cache.max_cost = ByteSize(0);
        assert_eq!(
            config.validate().unwrap_err().kind(),
            warden_types::ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn zero_expiration_never_expires() {
        let mut config = WardenConfig::default();
        config.cache.expiration_seconds = 0;
        assert_eq!(config.cache.expiration(), None);
    }

    #[test]
    fn secrets_are_redacted() {
        let mut config = keycloak();
        config.idp.client_secret = "hunter2".to_string();
        config.kas.root_key = "00ff".repeat(16);
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("00ff00ff"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn key_paths_resolve_against_project() {
        let mut config = WardenConfig::default();
        let mut entry = keyring_entry("k1", "rsa:2048");
        entry.cert_path = Some(PathBuf::from("keys/kas.crt"));
        config.kas.keyring.push(entry);
        config.kas.keyring.push(KeyringConfig {
            private_key_path: PathBuf::from("/etc/warden/ec.pem"),
            ..keyring_entry("k2", "ec:secp256r1")
        });

        config.resolve_paths("/srv/warden");
        assert_eq!(
            config.kas.keyring[0].private_key_path,
            PathBuf::from("/srv/warden/keys/kas.pem")
        );
        assert_eq!(
            config.kas.keyring[0].cert_path,
            Some(PathBuf::from("/srv/warden/keys/kas.crt"))
        );
        assert_eq!(
            config.kas.keyring[1].private_key_path,
            PathBuf::from("/etc/warden/ec.pem")
        );
    }
}
