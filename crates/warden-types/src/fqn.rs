//! Fully-qualified names for attribute namespaces, definitions and values.
//!
//! Three shapes are recognized:
//!
//! ```text
//! https://<namespace>
//! https://<namespace>/attr/<name>
//! https://<namespace>/attr/<name>/value/<value>
//! ```
//!
//! Comparison is case-insensitive. Every constructor in this module returns the
//! canonical lowercase form, so callers can compare the strings directly.

use std::fmt::{self, Display};
use std::sync::LazyLock;

use regex::Regex;

/// Separator between a definition FQN and the value component.
pub const VALUE_MARKER: &str = "/value/";

const SCHEME: &str = "https://";

static VALUE_FQN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?<ns>[^/]+)/attr/(?<name>[^/]+)/value/(?<value>[^/]+)$")
        .expect("static regex is valid")
});

static DEFINITION_FQN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://(?<ns>[^/]+)/attr/(?<name>[^/]+)$").expect("static regex is valid")
});

static NAMESPACE_FQN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://(?<ns>[^/]+)$").expect("static regex is valid"));

static NAMESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?(:[0-9]{1,5})?$")
        .expect("static regex is valid")
});

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](-?[A-Za-z0-9])*$").expect("static regex is valid"));

static VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.-]+$").expect("static regex is valid"));

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FqnError {
    #[error("invalid FQN format: {0}")]
    InvalidFormat(String),

    #[error("value FQN {0} does not contain {VALUE_MARKER}")]
    MissingValueMarker(String),

    #[error("invalid FQN: namespace is required")]
    MissingNamespace,

    #[error("invalid FQN: attribute name is required when a value is given")]
    MissingName,
}

// ============================================================================
// AttributeFqn
// ============================================================================

/// A parsed attribute FQN.
///
/// All components are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeFqn {
    namespace: String,
    name: Option<String>,
    value: Option<String>,
}

impl AttributeFqn {
    /// Parses any of the three FQN shapes, validating each component.
    pub fn parse(fqn: &str) -> Result<Self, FqnError> {
        let invalid = || FqnError::InvalidFormat(fqn.to_string());

        if let Some(caps) = VALUE_FQN.captures(fqn) {
            let (ns, name, value) = (&caps["ns"], &caps["name"], &caps["value"]);
            if !NAMESPACE.is_match(ns) || !NAME.is_match(name) || !VALUE.is_match(value) {
                return Err(invalid());
            }
            return Ok(Self::from_parts(ns, Some(name), Some(value)));
        }

        if let Some(caps) = DEFINITION_FQN.captures(fqn) {
            let (ns, name) = (&caps["ns"], &caps["name"]);
            if !NAMESPACE.is_match(ns) || !NAME.is_match(name) {
                return Err(invalid());
            }
            return Ok(Self::from_parts(ns, Some(name), None));
        }

        if let Some(caps) = NAMESPACE_FQN.captures(fqn) {
            let ns = &caps["ns"];
            if !NAMESPACE.is_match(ns) {
                return Err(invalid());
            }
            return Ok(Self::from_parts(ns, None, None));
        }

        Err(invalid())
    }

    fn from_parts(namespace: &str, name: Option<&str>, value: Option<&str>) -> Self {
        Self {
            namespace: namespace.to_lowercase(),
            name: name.map(str::to_lowercase),
            value: value.map(str::to_lowercase),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_value(&self) -> bool {
        self.value.is_some()
    }

    /// The definition FQN this FQN belongs to, if it names an attribute.
    pub fn definition(&self) -> Option<Self> {
        self.name.as_ref().map(|name| Self {
            namespace: self.namespace.clone(),
            name: Some(name.clone()),
            value: None,
        })
    }
}

impl Display for AttributeFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}", self.namespace)?;
        if let Some(name) = &self.name {
            write!(f, "/attr/{name}")?;
            if let Some(value) = &self.value {
                write!(f, "{VALUE_MARKER}{value}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Free functions
// ============================================================================

/// Returns the canonical (lowercase) form of an FQN string.
pub fn canonicalize(fqn: &str) -> String {
    fqn.to_lowercase()
}

/// Truncates a value FQN at its last `/value/` marker.
///
/// ```
/// # use warden_types::definition_fqn_from_value_fqn;
/// let def = definition_fqn_from_value_fqn("https://example.org/attr/foo/value/Bar").unwrap();
/// assert_eq!(def, "https://example.org/attr/foo");
/// ```
pub fn definition_fqn_from_value_fqn(value_fqn: &str) -> Result<String, FqnError> {
    let mut canonical = canonicalize(value_fqn);
    let idx = canonical
        .rfind(VALUE_MARKER)
        .ok_or_else(|| FqnError::MissingValueMarker(value_fqn.to_string()))?;
    canonical.truncate(idx);
    Ok(canonical)
}

/// Builds the most specific FQN the given components allow.
///
/// Empty strings count as absent. A namespace is always required, and a value
/// requires a name.
pub fn build_fqn(namespace: &str, name: &str, value: &str) -> Result<String, FqnError> {
    if namespace.is_empty() {
        return Err(FqnError::MissingNamespace);
    }
    let fqn = match (name.is_empty(), value.is_empty()) {
        (false, false) => format!("{SCHEME}{namespace}/attr/{name}{VALUE_MARKER}{value}"),
        (false, true) => format!("{SCHEME}{namespace}/attr/{name}"),
        (true, true) => format!("{SCHEME}{namespace}"),
        (true, false) => return Err(FqnError::MissingName),
    };
    Ok(canonicalize(&fqn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn parse_value_fqn() {
        let fqn = AttributeFqn::parse("https://www.example.org/attr/foo/value/VaLuE1").unwrap();
        assert_eq!(fqn.namespace(), "www.example.org");
        assert_eq!(fqn.name(), Some("foo"));
        assert_eq!(fqn.value(), Some("value1"));
        assert_eq!(
            fqn.to_string(),
            "https://www.example.org/attr/foo/value/value1"
        );
        assert_eq!(
            fqn.definition().unwrap().to_string(),
            "https://www.example.org/attr/foo"
        );
    }

    #[test]
    fn parse_definition_and_namespace() {
        let def = AttributeFqn::parse("https://example.org/attr/Classification").unwrap();
        assert!(!def.is_value());
        assert_eq!(def.to_string(), "https://example.org/attr/classification");

        let ns = AttributeFqn::parse("https://example.org").unwrap();
        assert_eq!(ns.name(), None);
        assert!(ns.definition().is_none());
    }

    #[test_case("http://example.org/attr/a/value/b" ; "wrong scheme")]
    #[test_case("https://example.org/attr/-a/value/b" ; "leading hyphen in name")]
    #[test_case("https://example.org/attr/a--b/value/c" ; "double hyphen in name")]
    #[test_case("https://example.org/attr/a/value/b_c" ; "underscore in value")]
    #[test_case("https://example.org/attr/a/value/b/extra" ; "trailing segment")]
    #[test_case("https://example.org/attrs/a" ; "unknown segment")]
    #[test_case("" ; "empty")]
    fn parse_rejects(input: &str) {
        assert!(matches!(
            AttributeFqn::parse(input),
            Err(FqnError::InvalidFormat(_))
        ));
    }

    #[test]
    fn definition_from_value_uses_last_marker() {
        assert_eq!(
            definition_fqn_from_value_fqn("https://ns.io/attr/value/value/x").unwrap(),
            "https://ns.io/attr/value"
        );
        assert!(matches!(
            definition_fqn_from_value_fqn("https://ns.io/attr/a"),
            Err(FqnError::MissingValueMarker(_))
        ));
    }

    #[test_case("ns.io", "a", "v", "https://ns.io/attr/a/value/v")]
    #[test_case("ns.io", "a", "", "https://ns.io/attr/a")]
    #[test_case("NS.io", "", "", "https://ns.io")]
    fn build(ns: &str, name: &str, value: &str, expected: &str) {
        assert_eq!(build_fqn(ns, name, value).unwrap(), expected);
    }

    #[test]
    fn build_requires_namespace_and_name() {
        assert_eq!(build_fqn("", "a", "v"), Err(FqnError::MissingNamespace));
        assert_eq!(build_fqn("ns.io", "", "v"), Err(FqnError::MissingName));
    }

    proptest! {
        #[test]
        fn parse_is_case_insensitive(
            name in "[a-z0-9]{1,8}",
            value in "[a-z0-9.]{1,8}",
            mask in proptest::collection::vec(any::<bool>(), 8),
        ) {
            let mangled: String = value
                .chars()
                .zip(mask.iter().cycle())
                .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                .collect();
            let input = format!("https://Example.org/attr/{name}/value/{mangled}");
            let parsed = AttributeFqn::parse(&input).unwrap();
            prop_assert_eq!(
                parsed.to_string(),
                format!("https://example.org/attr/{name}/value/{value}")
            );
        }
    }
}
