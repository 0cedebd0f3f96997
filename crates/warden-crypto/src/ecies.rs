//! ECDH + HKDF + AES-GCM hybrid encryption.
//!
//! The sender generates an ephemeral key on the recipient's curve, derives a
//! 32-byte AES key with HKDF-SHA256 over the ECDH secret and seals the payload
//! as `nonce || ciphertext || tag`. The ephemeral public key travels alongside.

use zeroize::Zeroizing;

use crate::aead;
use crate::ec::{EcPrivateKey, EcPublicKey};
use crate::encapsulator::Encapsulator;
use crate::error::{CryptoError, Result};
use crate::kdf;

/// ECDH followed by HKDF-SHA256 to `len` bytes.
pub fn derive_shared_key(
    private: &EcPrivateKey,
    peer: &EcPublicKey,
    salt: &[u8],
    info: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    let secret = private.diffie_hellman(peer)?;
    kdf::hkdf_sha256(salt, &secret, info, len)
}

/// Encrypts for a recipient public key using a fresh ephemeral key.
#[derive(Debug)]
pub struct EcEncryptor {
    recipient: EcPublicKey,
    ephemeral: EcPrivateKey,
    salt: Vec<u8>,
    info: Vec<u8>,
}

impl EcEncryptor {
    pub fn new(recipient: EcPublicKey, salt: &[u8], info: &[u8]) -> Self {
        let ephemeral = EcPrivateKey::generate(recipient.curve());
        Self {
            recipient,
            ephemeral,
            salt: salt.to_vec(),
            info: info.to_vec(),
        }
    }

    pub fn recipient(&self) -> &EcPublicKey {
        &self.recipient
    }

    pub fn ephemeral_public_key(&self) -> EcPublicKey {
        self.ephemeral.public_key()
    }
}

impl Encapsulator for EcEncryptor {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = derive_shared_key(
            &self.ephemeral,
            &self.recipient,
            &self.salt,
            &self.info,
            aead::KEY_LEN,
        )?;
        aead::seal(&key, data)
    }

    /// The ephemeral public key, which the recipient needs to derive the same secret.
    fn public_key_pem(&self) -> Result<String> {
        self.ephemeral.public_key().to_pem()
    }

    fn ephemeral_key(&self) -> Option<Vec<u8>> {
        self.ephemeral.public_key().to_der().ok()
    }
}

/// Decrypts payloads produced by an [`EcEncryptor`] for this private key.
#[derive(Debug)]
pub struct EcDecryptor {
    key: EcPrivateKey,
    salt: Vec<u8>,
    info: Vec<u8>,
}

impl EcDecryptor {
    pub fn new(key: EcPrivateKey, salt: &[u8], info: &[u8]) -> Self {
        Self {
            key,
            salt: salt.to_vec(),
            info: info.to_vec(),
        }
    }

    pub fn decrypt(&self, ephemeral: &EcPublicKey, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if ephemeral.curve() != self.key.curve() {
            return Err(CryptoError::CurveMismatch {
                expected: self.key.curve(),
                actual: ephemeral.curve(),
            });
        }
        let key = derive_shared_key(&self.key, ephemeral, &self.salt, &self.info, aead::KEY_LEN)?;
        aead::open(&key, ciphertext).map(Zeroizing::new)
    }
}
