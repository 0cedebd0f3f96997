//! Claim extraction from bearer tokens.
//!
//! Tokens reaching the resolver were already authenticated upstream, so the
//! signature and time claims are not checked here.

use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::error::{ErsError, Result};

/// Claim naming the client the token was issued to.
pub const CLIENT_SELECTOR: &str = "azp";

/// Claim naming the user.
pub const USERNAME_SELECTOR: &str = "preferred_username";

/// Parses `jwt` and returns every claim in its payload.
pub fn parse_claims(jwt: &str) -> Result<Map<String, Value>> {
    let header = decode_header(jwt).map_err(|e| ErsError::InvalidJwt(e.to_string()))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Map<String, Value>>(jwt, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| ErsError::InvalidJwt(e.to_string()))?;
    Ok(data.claims)
}

/// Returns claim `selector` as a string.
pub fn string_claim<'a>(claims: &'a Map<String, Value>, selector: &str) -> Result<&'a str> {
    match claims.get(selector) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ErsError::InvalidJwt(format!(
            "claim {selector} is not a string"
        ))),
        None => Err(ErsError::InvalidJwt(format!(
            "error extracting selector {selector} from jwt"
        ))),
    }
}
