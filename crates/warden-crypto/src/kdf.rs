//! Key derivation and policy binding.
//!
//! Salts are domain separators: `SHA256("TDF")` for standard TDF key
//! encapsulation and `SHA256("L1L")` for NanoTDF (version `L1L`).

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const HMAC_LEN: usize = 32;

/// Salt for standard TDF ECIES key wrapping.
pub fn tdf_salt() -> [u8; 32] {
    Sha256::digest(b"TDF").into()
}

/// Salt for NanoTDF key derivation.
pub fn nano_salt() -> [u8; 32] {
    Sha256::digest(b"L1L").into()
}

/// RFC 5869 HKDF-SHA256 extract and expand.
///
/// An empty salt is treated as absent.
pub fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new((!salt.is_empty()).then_some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; len]);
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(okm)
}

/// `HMAC-SHA256(key, message)`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; HMAC_LEN]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time check that `binding == HMAC-SHA256(key, message)`.
pub fn verify_hmac(key: &[u8], message: &[u8], binding: &[u8]) -> Result<bool> {
    let expected = hmac_sha256(key, message)?;
    Ok(expected.as_slice().ct_eq(binding).into())
}
