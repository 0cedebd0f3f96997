//! Human-readable byte sizes ("1gb", "512mb", "64kb", "4096").
//!
//! Units are binary: `1kb` is 1024 bytes. Matching is case-insensitive and
//! tolerates whitespace between number and unit.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CacheError;

const UNITS: &[(&str, u64)] = &[
    ("tb", 1 << 40),
    ("gb", 1 << 30),
    ("mb", 1 << 20),
    ("kb", 1 << 10),
    ("t", 1 << 40),
    ("g", 1 << 30),
    ("m", 1 << 20),
    ("k", 1 << 10),
    ("b", 1),
];

/// Parses a byte size string into a number of bytes.
pub fn parse_byte_size(input: &str) -> Result<u64, CacheError> {
    let invalid = |reason| CacheError::InvalidSize {
        input: input.to_string(),
        reason,
    };

    let normalized = input.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(invalid("empty"));
    }

    let split = normalized
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(normalized.len());
    let (digits, unit) = normalized.split_at(split);
    let unit = unit.trim();

    if digits.is_empty() {
        return Err(invalid("missing number"));
    }
    let number: u64 = digits.parse().map_err(|_| invalid("number out of range"))?;

    let multiplier = if unit.is_empty() {
        1
    } else {
        UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, m)| *m)
            .ok_or_else(|| invalid("unknown unit"))?
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("size overflows u64"))
}

/// A byte count that deserializes from either an integer or a size string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ByteSizeVisitor;

        impl Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte count or a size string like \"1gb\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ByteSize, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ByteSize, E> {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ByteSize, E> {
                parse_byte_size(v).map(ByteSize).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("1gb", 1 << 30)]
    #[test_case("1GB", 1 << 30)]
    #[test_case("512mb", 512 << 20)]
    #[test_case("64 kb", 64 << 10)]
    #[test_case("  100b ", 100)]
    #[test_case("4096", 4096)]
    #[test_case("2g", 2 << 30)]
    fn parses(input: &str, expected: u64) {
        assert_eq!(parse_byte_size(input).unwrap(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("gb" ; "no number")]
    #[test_case("12 parsecs" ; "unknown unit")]
    #[test_case("1.5gb" ; "fraction")]
    #[test_case("99999999999999tb" ; "overflow")]
    fn rejects(input: &str) {
        assert!(matches!(
            parse_byte_size(input),
            Err(CacheError::InvalidSize { .. })
        ));
    }

    #[test]
    fn deserializes_both_forms() {
        let from_int: ByteSize = serde_json::from_str("2048").unwrap();
        let from_str: ByteSize = serde_json::from_str("\"2kb\"").unwrap();
        assert_eq!(from_int, from_str);
        assert!(serde_json::from_str::<ByteSize>("-1").is_err());
    }

    proptest! {
        #[test]
        fn megabytes_scale(n in 0u64..1_000_000) {
            prop_assert_eq!(parse_byte_size(&format!("{n}mb")).unwrap(), n << 20);
        }
    }
}
