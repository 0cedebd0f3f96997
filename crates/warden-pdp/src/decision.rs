//! Decision results with their diagnostic trail.

use serde::Serialize;
use warden_types::{AttributeDefinition, AttributeValue};

/// The rolled-up access decision for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// True iff every `DataRuleResult` in `results` passed.
    pub access: bool,
    /// One result per attribute definition evaluated, in evaluation order.
    pub results: Vec<DataRuleResult>,
}

/// The outcome of one attribute definition's rule for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRuleResult {
    pub passed: bool,
    pub rule_definition: AttributeDefinition,
    pub value_failures: Vec<ValueFailure>,
}

/// A data value the entity did not satisfy.
///
/// `data_attribute` is `None` only for the hierarchy sentinel emitted when no
/// data value appears in the definition's ordered values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueFailure {
    pub data_attribute: Option<AttributeValue>,
    pub message: String,
}

impl Decision {
    pub(crate) fn from_result(result: DataRuleResult) -> Self {
        Self {
            access: result.passed,
            results: vec![result],
        }
    }

    pub(crate) fn merge(&mut self, result: DataRuleResult) {
        self.access = self.access && result.passed;
        self.results.push(result);
    }
}
