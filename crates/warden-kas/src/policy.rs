//! The data policy carried by a key access object, and its binding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use warden_types::ResourceAttribute;

use crate::error::{KasError, Result};

/// Length of an HMAC-SHA256 binding once decoded.
const BINDING_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub uuid: String,
    pub body: PolicyBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyBody {
    pub data_attributes: Vec<PolicyAttribute>,
    pub dissem: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyAttribute {
    /// Attribute value FQN.
    pub attribute: String,
}

impl Policy {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| KasError::InvalidPolicy(e.to_string()))
    }

    /// Decodes the base64 JSON form used by TDF key access objects.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| KasError::InvalidPolicy(format!("base64: {e}")))?;
        Self::from_json(&bytes)
    }

    pub fn to_base64(&self) -> Result<String> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| KasError::InvalidPolicy(e.to_string()))?;
        Ok(STANDARD.encode(bytes))
    }

    /// The resource the policy protects. The policy uuid becomes its id.
    pub fn resource(&self) -> ResourceAttribute {
        ResourceAttribute::new(self.body.data_attributes.iter().map(|a| a.attribute.clone()))
            .with_id(self.uuid.clone())
    }
}

/// Decodes a policy binding: base64 of the raw HMAC, or base64 of its
/// lowercase hex as older clients send it.
pub fn decode_binding(binding: &str) -> Result<Vec<u8>> {
    let decoded = STANDARD
        .decode(binding.trim())
        .map_err(|e| KasError::InvalidBinding(format!("base64: {e}")))?;
    if decoded.len() == BINDING_LEN * 2 && decoded.iter().all(u8::is_ascii_hexdigit) {
        return hex::decode(&decoded).map_err(|e| KasError::InvalidBinding(format!("hex: {e}")));
    }
    if decoded.len() != BINDING_LEN {
        return Err(KasError::InvalidBinding(format!(
            "expected {BINDING_LEN} bytes, got {}",
            decoded.len()
        )));
    }
    Ok(decoded)
}
