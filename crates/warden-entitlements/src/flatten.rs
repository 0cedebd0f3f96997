//! Selector paths over entity records.
//!
//! A record is flattened into `(selector, scalar)` pairs. Object keys extend
//! the selector with `.key`; list elements appear both under their index
//! `[i]` and under the wildcard `[]`, so `.groups[]` selects every group.

use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    items: Vec<(String, Value)>,
}

impl Flattened {
    pub fn new(record: &Map<String, Value>) -> Self {
        let mut items = Vec::new();
        for (key, value) in record {
            walk(format!(".{key}"), value, &mut items);
        }
        Self { items }
    }

    /// Every scalar stored under `selector`. A missing leading `.` is implied.
    pub fn select(&self, selector: &str) -> Vec<&Value> {
        let selector = selector.strip_prefix('.').unwrap_or(selector);
        self.items
            .iter()
            .filter(|(key, _)| key.strip_prefix('.') == Some(selector))
            .map(|(_, value)| value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn walk(path: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(format!("{path}.{key}"), child, out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                walk(format!("{path}[{idx}]"), child, out);
            }
            for child in items {
                walk(format!("{path}[]"), child, out);
            }
        }
        scalar => out.push((path, scalar.clone())),
    }
}
