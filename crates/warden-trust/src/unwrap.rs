//! Private-key operations shared by the key managers.
//!
//! Each manager obtains a private key PEM its own way and hands it here.

use tracing::debug;
use warden_crypto::ec::{EcPrivateKey, EcPublicKey};
use warden_crypto::ecies::{EcDecryptor, derive_shared_key};
use warden_crypto::rsa::RsaDecryptor;
use warden_crypto::{CryptoError, Encapsulator, aead, encapsulator_from_public_pem, kdf};
use warden_types::{EcCurve, KeyAlgorithm};
use zeroize::Zeroizing;

use crate::error::{Result, TrustError};
use crate::key::{KeyDetails, ProtectedKey};

fn protect(mut raw: Zeroizing<Vec<u8>>) -> ProtectedKey {
    ProtectedKey::new(std::mem::take(&mut *raw))
}

fn ec_private_key(private_pem: &str, curve: EcCurve) -> Result<EcPrivateKey> {
    let private = EcPrivateKey::from_pem(private_pem)?;
    if private.curve() != curve {
        return Err(CryptoError::CurveMismatch {
            expected: curve,
            actual: private.curve(),
        }
        .into());
    }
    Ok(private)
}

pub(crate) fn decrypt_with_pem(
    key: &KeyDetails,
    private_pem: &str,
    ciphertext: &[u8],
    ephemeral_public_key: Option<&[u8]>,
) -> Result<ProtectedKey> {
    match key.algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            if ephemeral_public_key.is_some_and(|k| !k.is_empty()) {
                debug!(kid = %key.id, "ignoring ephemeral key for RSA unwrap");
            }
            let decryptor = RsaDecryptor::from_pem(private_pem)?;
            Ok(protect(decryptor.decrypt(ciphertext)?))
        }
        KeyAlgorithm::Ec(curve) => {
            let ephemeral = ephemeral_public_key
                .filter(|k| !k.is_empty())
                .ok_or(TrustError::MissingEphemeralKey)?;
            let ephemeral = EcPublicKey::from_ephemeral(ephemeral)?;
            let private = ec_private_key(private_pem, curve)?;
            let decryptor = EcDecryptor::new(private, &kdf::tdf_salt(), b"");
            Ok(protect(decryptor.decrypt(&ephemeral, ciphertext)?))
        }
    }
}

/// ECDH with the client's point, then HKDF-SHA256 under the NanoTDF salt to
/// an AES-256 key.
pub(crate) fn derive_with_pem(
    key: &KeyDetails,
    private_pem: &str,
    ephemeral_public_key: &[u8],
    curve: EcCurve,
) -> Result<ProtectedKey> {
    let Some(key_curve) = key.algorithm.curve() else {
        return Err(TrustError::UnsupportedAlgorithm(format!(
            "key {} is {}; key derivation needs an EC key",
            key.id, key.algorithm
        )));
    };
    if key_curve != curve {
        return Err(CryptoError::CurveMismatch {
            expected: key_curve,
            actual: curve,
        }
        .into());
    }

    let peer = EcPublicKey::from_ephemeral(ephemeral_public_key)?;
    let private = ec_private_key(private_pem, curve)?;
    let derived = derive_shared_key(&private, &peer, &kdf::nano_salt(), b"", aead::KEY_LEN)?;
    Ok(protect(derived))
}

/// Encapsulator for the client's ephemeral public key.
pub(crate) fn session_encapsulator(ephemeral_public_key_pem: &str) -> Result<Box<dyn Encapsulator>> {
    Ok(encapsulator_from_public_pem(
        ephemeral_public_key_pem,
        &kdf::nano_salt(),
        b"",
    )?)
}

/// Public key PEM for a private key PEM, checking it matches `algorithm`.
pub(crate) fn public_pem_for(algorithm: KeyAlgorithm, private_pem: &str) -> Result<String> {
    match algorithm {
        KeyAlgorithm::Rsa2048 | KeyAlgorithm::Rsa4096 => {
            let decryptor = RsaDecryptor::from_pem(private_pem)?;
            let expected = if algorithm == KeyAlgorithm::Rsa2048 { 2048 } else { 4096 };
            if decryptor.bits() != expected {
                return Err(TrustError::UnsupportedAlgorithm(format!(
                    "{algorithm} key has {} bits",
                    decryptor.bits()
                )));
            }
            Ok(decryptor.encryptor().public_key_pem()?)
        }
        KeyAlgorithm::Ec(curve) => Ok(ec_private_key(private_pem, curve)?.public_key().to_pem()?),
    }
}
