//! Loads `kas.keyring` entries from disk.

use std::fs;

use anyhow::{Context, Result};
use tracing::debug;
use warden_config::KeyringConfig;
use warden_trust::KeyringEntry;

/// Reads every configured key file. Paths are used as given, so resolve
/// them against the project directory first.
pub fn load_keyring(entries: &[KeyringConfig]) -> Result<Vec<KeyringEntry>> {
    entries.iter().map(load_entry).collect()
}

fn load_entry(config: &KeyringConfig) -> Result<KeyringEntry> {
    let alg = config.algorithm()?;
    let private_pem = fs::read_to_string(&config.private_key_path).with_context(|| {
        format!(
            "reading private key for '{}' from {}",
            config.kid,
            config.private_key_path.display()
        )
    })?;

    let mut entry = KeyringEntry::new(config.kid.as_str(), alg, private_pem)
        .with_active(config.active)
        .with_legacy(config.legacy);
    if let Some(cert_path) = &config.cert_path {
        entry.cert = fs::read_to_string(cert_path).with_context(|| {
            format!(
                "reading public key for '{}' from {}",
                config.kid,
                cert_path.display()
            )
        })?;
    }
    debug!(kid = %config.kid, %alg, "keyring entry read");
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use warden_crypto::Encapsulator;
    use warden_crypto::rsa::RsaDecryptor;
    use warden_types::KeyAlgorithm;

    #[test]
    fn reads_private_and_public_pem() {
        let dir = tempdir().unwrap();
        let key = RsaDecryptor::generate(2048).unwrap();
        let private_path = dir.path().join("r1.pem");
        let cert_path = dir.path().join("r1.pub.pem");
        fs::write(&private_path, key.private_key_pem().unwrap().as_str()).unwrap();
        fs::write(&cert_path, key.encryptor().public_key_pem().unwrap()).unwrap();

        let entries = load_keyring(&[KeyringConfig {
            kid: "r1".to_string(),
            alg: "rsa:2048".to_string(),
            private_key_path: private_path,
            cert_path: Some(cert_path),
            active: false,
            legacy: true,
        }])
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].alg, KeyAlgorithm::Rsa2048);
        assert!(entries[0].cert.contains("PUBLIC KEY"));
        assert!(!entries[0].active);
        assert!(entries[0].legacy);
    }

    #[test]
    fn missing_file_names_the_key() {
        let err = load_keyring(&[KeyringConfig {
            kid: "gone".to_string(),
            alg: "rsa:2048".to_string(),
            private_key_path: PathBuf::from("/nonexistent/warden/gone.pem"),
            cert_path: None,
            active: true,
            legacy: false,
        }])
        .unwrap_err();
        assert!(format!("{err:#}").contains("'gone'"));
    }
}
