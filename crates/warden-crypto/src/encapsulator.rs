use std::fmt::Debug;

use crate::ec::EcPublicKey;
use crate::ecies::EcEncryptor;
use crate::error::{CryptoError, Result};
use crate::pem;
use crate::rsa::RsaEncryptor;

/// Wraps key material for a recipient.
///
/// RSA encapsulators have no ephemeral key. EC encapsulators expose the
/// ephemeral public key the recipient must combine with its private key.
pub trait Encapsulator: Send + Sync + Debug {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn public_key_pem(&self) -> Result<String>;

    /// DER-encoded ephemeral public key, if the scheme uses one.
    fn ephemeral_key(&self) -> Option<Vec<u8>>;
}

/// Builds an encapsulator from a recipient's SPKI public key PEM.
///
/// RSA keys get OAEP; EC keys get ECIES with the given HKDF salt and info.
pub fn encapsulator_from_public_pem(
    pem_text: &str,
    salt: &[u8],
    info: &[u8],
) -> Result<Box<dyn Encapsulator>> {
    let block = pem::parse_single(pem_text)?;
    match block.label.as_str() {
        pem::RSA_PUBLIC_KEY => Ok(Box::new(RsaEncryptor::from_pem(pem_text)?)),
        pem::PUBLIC_KEY => {
            if let Ok(rsa) = RsaEncryptor::from_spki_der(&block.contents) {
                return Ok(Box::new(rsa));
            }
            let ec = EcPublicKey::from_der(&block.contents)?;
            Ok(Box::new(EcEncryptor::new(ec, salt, info)))
        }
        other => Err(CryptoError::UnsupportedKeyType(other.to_string())),
    }
}
