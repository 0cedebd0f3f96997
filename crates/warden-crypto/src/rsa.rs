//! RSA-OAEP key wrapping.
//!
//! OAEP uses SHA-1 for both the label hash and MGF1, matching the keys that
//! existing TDF clients wrap against.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::encapsulator::Encapsulator;
use crate::error::{CryptoError, Result};
use crate::pem::{self, PemBlock};

/// RSA private key that unwraps OAEP-wrapped keys.
#[derive(Debug, Clone)]
pub struct RsaDecryptor {
    key: RsaPrivateKey,
}

impl RsaDecryptor {
    /// Parses a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let PemBlock { label, contents } = pem::parse_single(pem_text)?;
        let key = match label.as_str() {
            pem::PRIVATE_KEY => RsaPrivateKey::from_pkcs8_der(&contents)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            pem::RSA_PRIVATE_KEY => RsaPrivateKey::from_pkcs1_der(&contents)
                .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            other => return Err(CryptoError::UnsupportedKeyType(other.to_string())),
        };
        Ok(Self { key })
    }

    /// Generates a fresh key of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self> {
        let key =
            RsaPrivateKey::new(&mut OsRng, bits).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        self.key
            .decrypt(Oaep::new::<Sha1>(), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| CryptoError::Decrypt(e.to_string()))
    }

    pub fn encryptor(&self) -> RsaEncryptor {
        RsaEncryptor {
            key: self.key.to_public_key(),
        }
    }

    /// PKCS#8 PEM of the private key.
    pub fn private_key_pem(&self) -> Result<Zeroizing<String>> {
        let der = self
            .key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Zeroizing::new(pem::encode_pem(pem::PRIVATE_KEY, der.as_bytes())))
    }

    /// PKCS#1 PEM of the private key.
    pub fn private_key_pkcs1_pem(&self) -> Result<Zeroizing<String>> {
        let der = self
            .key
            .to_pkcs1_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Zeroizing::new(pem::encode_pem(
            pem::RSA_PRIVATE_KEY,
            der.as_bytes(),
        )))
    }
}

/// RSA public key that wraps data with OAEP.
#[derive(Debug, Clone)]
pub struct RsaEncryptor {
    key: RsaPublicKey,
}

impl RsaEncryptor {
    /// Parses an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem_text: &str) -> Result<Self> {
        let PemBlock { label, contents } = pem::parse_single(pem_text)?;
        match label.as_str() {
            pem::PUBLIC_KEY => Self::from_spki_der(&contents),
            pem::RSA_PUBLIC_KEY => RsaPublicKey::from_pkcs1_der(&contents)
                .map(|key| Self { key })
                .map_err(|e| CryptoError::InvalidKey(e.to_string())),
            other => Err(CryptoError::UnsupportedKeyType(other.to_string())),
        }
    }

    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        RsaPublicKey::from_public_key_der(der)
            .map(|key| Self { key })
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }
}

impl Encapsulator for RsaEncryptor {
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.key
            .encrypt(&mut OsRng, Oaep::new::<Sha1>(), data)
            .map_err(|e| CryptoError::Encrypt(e.to_string()))
    }

    fn public_key_pem(&self) -> Result<String> {
        let der = self
            .key
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(pem::encode_pem(pem::PUBLIC_KEY, der.as_bytes()))
    }

    fn ephemeral_key(&self) -> Option<Vec<u8>> {
        None
    }
}
