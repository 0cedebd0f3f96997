//! Configuration loader with multi-source merging

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{ConfigError, Paths, Result, WardenConfig};

/// Written by [`ConfigLoader::init_project`]. Every value shown is the
/// built-in default.
const PROJECT_TEMPLATE: &str = r#"# Warden project configuration.
# Per-machine overrides belong in warden.local.toml.

[ers]
# "claims" reads entities from the token; "keycloak" looks them up.
mode = "claims"

[idp]
# url = "https://keycloak.example.org"
# realm = "opentdf"
# client_id = "warden"
# client_secret = ""
legacy_keycloak = false
sub_groups = false
token_buffer_seconds = 120
request_timeout_seconds = 10

[idp.infer_id]
client_id = false
email = false
username = false

[cache]
enabled = true
max_cost = "1gb"
expiration_seconds = 60
shards = 16

[kas]
default_manager = "opentdf.io/in-process"

# [[kas.keyring]]
# kid = "r1"
# alg = "rsa:2048"
# private_key_path = "keys/kas-private.pem"
# cert_path = "keys/kas-cert.pem"

[entitlements]
send_idp_token = false
comprehensive_hierarchy = false

[logging]
filter = "info"
ansi = true
"#;

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    env_vars: Option<config::Map<String, String>>,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "WARDEN".to_string(),
            env_vars: None,
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "WARDEN")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read environment overrides from `vars` instead of the process
    /// environment.
    pub fn with_env_vars(mut self, vars: config::Map<String, String>) -> Self {
        self.env_vars = Some(vars);
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<WardenConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = WardenConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/warden/config.toml)
        if let Ok(user_config_file) = Paths::new().user_config_file() {
            if user_config_file.exists() {
                debug!(path = %user_config_file.display(), "loading user config");
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 3. Project config (warden.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            debug!(path = %project_config_file.display(), "loading project config");
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (warden.local.toml)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            debug!(path = %local_config_file.display(), "loading local config");
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (WARDEN_CACHE__MAX_COST=512mb)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.env_vars),
        );

        let mut warden_config: WardenConfig = builder.build()?.try_deserialize()?;
        warden_config.resolve_paths(&self.project_dir);
        warden_config.validate()?;

        Ok(warden_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> WardenConfig {
        self.load().unwrap_or_default()
    }

    /// Writes a commented `warden.toml` into the project directory.
    pub fn init_project(&self) -> Result<PathBuf> {
        let path = Paths::project_config_file(&self.project_dir);
        if path.exists() {
            return Err(ConfigError::AlreadyInitialized(path));
        }
        fs::create_dir_all(&self.project_dir).map_err(|source| ConfigError::WriteError {
            path: self.project_dir.clone(),
            source,
        })?;
        fs::write(&path, PROJECT_TEMPLATE).map_err(|source| ConfigError::WriteError {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "initialized project config");
        Ok(path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
