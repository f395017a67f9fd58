//! Result types produced by criteria.

use super::{EvaluationContext, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    /// A value that should be unique appears more than once in the stream
    FieldUniqueness,
    /// A value is missing, blank or cannot be interpreted
    RecordContentValue,
    /// A value was interpreted but lies outside its allowed range
    RecordContentBounds,
}

impl ValidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::FieldUniqueness => "field_uniqueness",
            ValidationType::RecordContentValue => "record_content_value",
            ValidationType::RecordContentBounds => "record_content_bounds",
        }
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding inside a [`ValidationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResultElement {
    criterion_key: String,
    category: ValidationType,
    severity: Severity,
    message: String,
}

impl ValidationResultElement {
    pub fn new(
        criterion_key: impl Into<String>,
        category: ValidationType,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            criterion_key: criterion_key.into(),
            category,
            severity,
            message: message.into(),
        }
    }

    pub fn criterion_key(&self) -> &str {
        &self.criterion_key
    }

    pub fn category(&self) -> ValidationType {
        self.category
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The outcome of one criterion invocation against one record.
///
/// A result with no elements means the criterion ran and the record passed.
/// That is different from a criterion returning no result at all, which means
/// the criterion did not apply to the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    record_id: String,
    context: EvaluationContext,
    row_type: String,
    elements: Vec<ValidationResultElement>,
}

impl ValidationResult {
    /// Creates a passing result (no elements).
    pub fn passed(
        record_id: impl Into<String>,
        context: EvaluationContext,
        row_type: impl Into<String>,
    ) -> Self {
        Self::with_elements(record_id, context, row_type, Vec::new())
    }

    pub fn with_elements(
        record_id: impl Into<String>,
        context: EvaluationContext,
        row_type: impl Into<String>,
        elements: Vec<ValidationResultElement>,
    ) -> Self {
        Self {
            record_id: record_id.into(),
            context,
            row_type: row_type.into(),
            elements,
        }
    }

    /// The id of the offending record, or the offending value for
    /// stream-level findings such as duplicates.
    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn row_type(&self) -> &str {
        &self.row_type
    }

    pub fn elements(&self) -> &[ValidationResultElement] {
        &self.elements
    }

    /// Returns true when the criterion ran and found nothing to report.
    pub fn is_passed(&self) -> bool {
        self.elements.is_empty()
    }

    /// Highest severity among the elements, `None` for a passing result.
    pub fn max_severity(&self) -> Option<Severity> {
        self.elements.iter().map(|e| e.severity).max()
    }

    pub fn contains_category(&self, category: ValidationType) -> bool {
        self.elements.iter().any(|e| e.category == category)
    }

    pub fn contains_message(&self, message: &str) -> bool {
        self.elements.iter().any(|e| e.message == message)
    }
}

/// The value carried by an [`AggregationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregationValue {
    Integer(i64),
    Ratio(f64),
    Flag(bool),
    Text(String),
}

impl From<i64> for AggregationValue {
    fn from(value: i64) -> Self {
        AggregationValue::Integer(value)
    }
}

impl From<u64> for AggregationValue {
    fn from(value: u64) -> Self {
        AggregationValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AggregationValue {
    fn from(value: f64) -> Self {
        AggregationValue::Ratio(value)
    }
}

impl From<bool> for AggregationValue {
    fn from(value: bool) -> Self {
        AggregationValue::Flag(value)
    }
}

impl From<String> for AggregationValue {
    fn from(value: String) -> Self {
        AggregationValue::Text(value)
    }
}

impl From<&str> for AggregationValue {
    fn from(value: &str) -> Self {
        AggregationValue::Text(value.to_string())
    }
}

/// A dataset-wide fact computed once a stream has been fully observed.
///
/// `T` is the typed value; accumulators store the erased form
/// `AggregationResult<AggregationValue>`, see [`AggregationResult::erase`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult<T = AggregationValue> {
    key: String,
    value: T,
    context: EvaluationContext,
    severity: Severity,
}

impl<T> AggregationResult<T> {
    /// Creates an informational aggregation (`Severity::Ok`).
    pub fn new(key: impl Into<String>, value: T, context: EvaluationContext) -> Self {
        Self {
            key: key.into(),
            value,
            context,
            severity: Severity::Ok,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Converts the typed value into the form accumulators store.
    pub fn erase(self) -> AggregationResult<AggregationValue>
    where
        T: Into<AggregationValue>,
    {
        AggregationResult {
            key: self.key,
            value: self.value.into(),
            context: self.context,
            severity: self.severity,
        }
    }
}
