//! AES-256-GCM.
//!
//! Two framings are supported:
//! - nonce-prefixed blobs (`nonce(12) || ciphertext || tag(16)`), used for
//!   wrapped keys and ECIES payloads
//! - explicit IV plus a body with a trailing tag of 12 to 16 bytes, used for
//!   NanoTDF policies and payloads

use aes_gcm::aead::consts::{U12, U13, U14, U15, U16};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{Aes256Gcm, AesGcm, Nonce, TagSize};
use rand::RngCore;

use crate::error::{CryptoError, Result};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

fn check_key(key: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidLength {
            what: "AES-256 key",
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(())
}

/// Encrypts with a random nonce and returns `nonce || ciphertext || tag`.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    seal_with_aad(key, plaintext, b"")
}

pub fn seal_with_aad(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    check_key(key)?;
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

    // Prepend nonce to ciphertext so open can extract it
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a `nonce || ciphertext || tag` blob produced by [`seal`].
pub fn open(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    open_with_aad(key, blob, b"")
}

pub fn open_with_aad(key: &[u8], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Decrypt(
            "ciphertext too short to contain nonce and tag".to_string(),
        ));
    }
    let (nonce, body) = blob.split_at(NONCE_LEN);
    decrypt_with_iv(key, nonce, body, TAG_LEN, aad)
}

/// Decrypts `body` (ciphertext with a trailing tag of `tag_size` bytes) under `iv`.
pub fn decrypt_with_iv(
    key: &[u8],
    iv: &[u8],
    body: &[u8],
    tag_size: usize,
    aad: &[u8],
) -> Result<Vec<u8>> {
    check_key(key)?;
    if iv.len() != NONCE_LEN {
        return Err(CryptoError::InvalidLength {
            what: "AES-GCM IV",
            expected: NONCE_LEN,
            actual: iv.len(),
        });
    }
    if body.len() < tag_size {
        return Err(CryptoError::Decrypt("ciphertext shorter than tag".to_string()));
    }
    match tag_size {
        12 => decrypt_tagged::<U12>(key, iv, body, aad),
        13 => decrypt_tagged::<U13>(key, iv, body, aad),
        14 => decrypt_tagged::<U14>(key, iv, body, aad),
        15 => decrypt_tagged::<U15>(key, iv, body, aad),
        16 => decrypt_tagged::<U16>(key, iv, body, aad),
        other => Err(CryptoError::UnsupportedTagSize(other)),
    }
}

/// Encrypts under an explicit IV with a tag of `tag_size` bytes appended.
pub fn encrypt_with_iv(key: &[u8], iv: &[u8], plaintext: &[u8], tag_size: usize) -> Result<Vec<u8>> {
    check_key(key)?;
    if iv.len() != NONCE_LEN {
        return Err(CryptoError::InvalidLength {
            what: "AES-GCM IV",
            expected: NONCE_LEN,
            actual: iv.len(),
        });
    }
    match tag_size {
        12 => encrypt_tagged::<U12>(key, iv, plaintext),
        13 => encrypt_tagged::<U13>(key, iv, plaintext),
        14 => encrypt_tagged::<U14>(key, iv, plaintext),
        15 => encrypt_tagged::<U15>(key, iv, plaintext),
        16 => encrypt_tagged::<U16>(key, iv, plaintext),
        other => Err(CryptoError::UnsupportedTagSize(other)),
    }
}

fn decrypt_tagged<T: TagSize>(key: &[u8], iv: &[u8], body: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = AesGcm::<Aes256, U12, T>::new_from_slice(key)
        .map_err(|e| CryptoError::Decrypt(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(iv), Payload { msg: body, aad })
        .map_err(|_| CryptoError::Decrypt("authentication failed".to_string()))
}

fn encrypt_tagged<T: TagSize>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = AesGcm::<Aes256, U12, T>::new_from_slice(key)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| CryptoError::Encrypt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn seal_open_roundtrip() {
        let blob = seal(&KEY, b"sensitive").unwrap();
        assert_eq!(blob.len(), NONCE_LEN + 9 + TAG_LEN);
        assert_eq!(open(&KEY, &blob).unwrap(), b"sensitive");
    }

    #[test]
    fn seal_uses_fresh_nonces() {
        let a = seal(&KEY, b"x").unwrap();
        let b = seal(&KEY, b"x").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_blob_fails() {
        let mut blob = seal(&KEY, b"sensitive").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(open(&KEY, &blob), Err(CryptoError::Decrypt(_))));
    }

    #[test]
    fn wrong_key_fails() {
        let blob = seal(&KEY, b"sensitive").unwrap();
        assert!(open(&[8u8; 32], &blob).is_err());
    }

    #[test]
    fn aad_is_authenticated() {
        let blob = seal_with_aad(&KEY, b"m", b"header").unwrap();
        assert!(open_with_aad(&KEY, &blob, b"header").is_ok());
        assert!(open_with_aad(&KEY, &blob, b"other").is_err());
    }

    #[test]
    fn short_key_rejected() {
        assert!(matches!(
            seal(&[1u8; 16], b"m"),
            Err(CryptoError::InvalidLength { .. })
        ));
    }

    #[test_case(12)]
    #[test_case(13)]
    #[test_case(14)]
    #[test_case(15)]
    #[test_case(16)]
    fn explicit_iv_tag_sizes(tag_size: usize) {
        let iv = [3u8; NONCE_LEN];
        let body = encrypt_with_iv(&KEY, &iv, b"policy", tag_size).unwrap();
        assert_eq!(body.len(), 6 + tag_size);
        let plain = decrypt_with_iv(&KEY, &iv, &body, tag_size, b"").unwrap();
        assert_eq!(plain, b"policy");
    }

    #[test]
    fn unsupported_tag_size() {
        let iv = [3u8; NONCE_LEN];
        assert!(matches!(
            decrypt_with_iv(&KEY, &iv, &[0u8; 32], 8, b""),
            Err(CryptoError::UnsupportedTagSize(8))
        ));
    }
}
