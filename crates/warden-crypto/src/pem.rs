//! PEM framing for keys and certificates.
//!
//! PEM is base64-encoded DER between `-----BEGIN <label>-----` and
//! `-----END <label>-----` markers (RFC 7468). Key parsing in this crate reads
//! the label to decide which DER decoder to run.

use base64::prelude::*;

/// PEM parsing error.
#[derive(Debug, thiserror::Error)]
pub enum PemError {
    #[error("invalid PEM format: {0}")]
    InvalidFormat(String),
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
    #[error("no PEM blocks found")]
    NoPemBlocks,
}

pub const PUBLIC_KEY: &str = "PUBLIC KEY";
pub const PRIVATE_KEY: &str = "PRIVATE KEY";
pub const RSA_PRIVATE_KEY: &str = "RSA PRIVATE KEY";
pub const RSA_PUBLIC_KEY: &str = "RSA PUBLIC KEY";
pub const EC_PRIVATE_KEY: &str = "EC PRIVATE KEY";
pub const CERTIFICATE: &str = "CERTIFICATE";

/// A parsed PEM block with its label and binary content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    /// The label from the BEGIN line (e.g., "PUBLIC KEY", "EC PRIVATE KEY")
    pub label: String,
    /// The decoded DER content
    pub contents: Vec<u8>,
}

/// Parse PEM-encoded text and return every block found, in order.
pub fn parse_pem(input: &str) -> Result<Vec<PemBlock>, PemError> {
    let mut blocks = Vec::new();
    let mut lines = input.lines();

    while let Some(line) = lines.next() {
        let line = line.trim();

        let Some(label) = line
            .strip_prefix("-----BEGIN ")
            .and_then(|s| s.strip_suffix("-----"))
        else {
            continue;
        };
        let label = label.to_string();
        let mut base64_data = String::new();
        let mut closed = false;

        for line in lines.by_ref() {
            let line = line.trim();
            if let Some(end_label) = line
                .strip_prefix("-----END ")
                .and_then(|s| s.strip_suffix("-----"))
            {
                if end_label != label {
                    return Err(PemError::InvalidFormat(format!(
                        "mismatched PEM markers: BEGIN {label} but END {end_label}"
                    )));
                }
                let contents = BASE64_STANDARD.decode(base64_data.as_bytes())?;
                blocks.push(PemBlock {
                    label: label.clone(),
                    contents,
                });
                closed = true;
                break;
            }
            // RFC 7468 explanatory headers are not used by key files.
            if !line.is_empty() {
                base64_data.push_str(line);
            }
        }

        if !closed {
            return Err(PemError::InvalidFormat(format!(
                "missing END marker for {label}"
            )));
        }
    }

    if blocks.is_empty() {
        return Err(PemError::NoPemBlocks);
    }

    Ok(blocks)
}

/// Parse PEM text expected to hold exactly one meaningful block; returns the first.
pub fn parse_single(input: &str) -> Result<PemBlock, PemError> {
    parse_pem(input)?
        .into_iter()
        .next()
        .ok_or(PemError::NoPemBlocks)
}

/// Encode DER bytes as PEM with 64-column lines.
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    let body = BASE64_STANDARD.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / 64 + label.len() * 2 + 40);
    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n");
    for chunk in body.as_bytes().chunks(64) {
        // base64 output is ASCII, so any byte boundary is a char boundary.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}
