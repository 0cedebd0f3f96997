//! Process-wide tracing setup.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;
use warden_config::LoggingConfig;

/// Builds the filter for `config`. `RUST_LOG` takes precedence when set.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::try_from_default_env()
            .with_context(|| format!("parsing {}", EnvFilter::DEFAULT_ENV));
    }
    EnvFilter::try_new(&config.filter)
        .with_context(|| format!("parsing logging.filter '{}'", config.filter))
}

/// Installs a `fmt` subscriber. Fails if one is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_directives() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let config = LoggingConfig {
            filter: "warden=loudest".to_string(),
            ansi: false,
        };
        let err = env_filter(&config).unwrap_err();
        assert!(err.to_string().contains("warden=loudest"));

        let config = LoggingConfig {
            filter: "warn,warden_kas=debug".to_string(),
            ansi: false,
        };
        env_filter(&config).unwrap();
    }
}
