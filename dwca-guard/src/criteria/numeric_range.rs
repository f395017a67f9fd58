//! Numeric-range criterion, with a preset for decimal coordinates.

use crate::core::{
    terms, EvaluationContext, Record, RecordCriterion, Severity, ValidationResult,
    ValidationResultElement, ValidationType,
};
use crate::messages::{self, DefaultMessages, SharedFormatter};
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const NUMERIC_RANGE_KEY: &str = "numericRangeCriterion";

/// Inclusive bounds for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    pub field: String,
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub fn new(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            field: field.into(),
            min,
            max,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// A pair of values that is technically valid but almost always a
/// placeholder, such as a 0/0 coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentinelPair {
    pub fields: (String, String),
    pub values: (f64, f64),
}

/// Checks that numeric fields parse and fall inside configured bounds.
///
/// Only failures produce a result; a record whose values are all in range
/// yields `None`. Blank values are ignored.
#[derive(Debug)]
pub struct NumericRangeCriterion {
    key: String,
    ranges: Vec<FieldRange>,
    sentinel: Option<SentinelPair>,
    severity: Severity,
    row_type_restriction: Option<String>,
    messages: SharedFormatter,
}

enum Reading<'a> {
    Blank,
    Invalid(&'a str),
    Value(&'a str, f64),
}

fn read<'a>(record: &'a Record, field: &str) -> Reading<'a> {
    match record.non_blank_value(field) {
        None => Reading::Blank,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Reading::Value(raw, v),
            _ => Reading::Invalid(raw),
        },
    }
}

impl NumericRangeCriterion {
    pub fn builder() -> NumericRangeCriterionBuilder {
        NumericRangeCriterionBuilder::default()
    }

    /// `decimalLatitude` in [-90, 90], `decimalLongitude` in [-180, 180],
    /// and 0/0 flagged as a probable default.
    pub fn coordinates() -> NumericRangeCriterionBuilder {
        Self::builder()
            .range(terms::DECIMAL_LATITUDE, -90.0, 90.0)
            .range(terms::DECIMAL_LONGITUDE, -180.0, 180.0)
            .sentinel(terms::DECIMAL_LATITUDE, terms::DECIMAL_LONGITUDE, 0.0, 0.0)
    }

    pub fn ranges(&self) -> &[FieldRange] {
        &self.ranges
    }

    fn element(
        &self,
        category: ValidationType,
        severity: Severity,
        message: String,
    ) -> ValidationResultElement {
        ValidationResultElement::new(&self.key, category, severity, message)
    }

    fn sentinel_element(&self, record: &Record) -> Option<ValidationResultElement> {
        let sentinel = self.sentinel.as_ref()?;
        let (a, b) = match (read(record, &sentinel.fields.0), read(record, &sentinel.fields.1)) {
            (Reading::Value(a_raw, a), Reading::Value(b_raw, b)) => ((a_raw, a), (b_raw, b)),
            _ => return None,
        };
        #[allow(clippy::float_cmp)]
        let is_sentinel = a.1 == sentinel.values.0 && b.1 == sentinel.values.1;
        is_sentinel.then(|| {
            self.element(
                ValidationType::RecordContentValue,
                Severity::Warning,
                self.messages
                    .format(messages::NUMERIC_SENTINEL, &[a.0.trim(), b.0.trim()]),
            )
        })
    }
}

impl RecordCriterion for NumericRangeCriterion {
    fn key(&self) -> &str {
        &self.key
    }

    fn validate(
        &mut self,
        record: &Record,
        context: &EvaluationContext,
    ) -> Result<Option<ValidationResult>> {
        if let Some(row_type) = &self.row_type_restriction {
            if !row_type.eq_ignore_ascii_case(record.row_type()) {
                return Ok(None);
            }
        }

        let mut elements = Vec::new();
        for range in &self.ranges {
            match read(record, &range.field) {
                Reading::Blank => {}
                Reading::Invalid(raw) => elements.push(self.element(
                    ValidationType::RecordContentValue,
                    self.severity,
                    self.messages
                        .format(messages::NUMERIC_NOT_NUMERIC, &[&range.field, raw.trim()]),
                )),
                Reading::Value(raw, value) if !range.contains(value) => {
                    let (min, max) = (range.min.to_string(), range.max.to_string());
                    elements.push(self.element(
                        ValidationType::RecordContentBounds,
                        self.severity,
                        self.messages.format(
                            messages::NUMERIC_OUT_OF_BOUNDS,
                            &[&range.field, raw.trim(), &min, &max],
                        ),
                    ));
                }
                Reading::Value(..) => {}
            }
        }
        elements.extend(self.sentinel_element(record));

        if elements.is_empty() {
            return Ok(None);
        }
        debug!(
            criterion.key = %self.key,
            record.id = %record.id(),
            findings = elements.len(),
            "Numeric values rejected"
        );
        Ok(Some(ValidationResult::with_elements(
            record.id(),
            context.clone(),
            record.row_type(),
            elements,
        )))
    }
}

/// Builder for [`NumericRangeCriterion`].
#[derive(Debug)]
pub struct NumericRangeCriterionBuilder {
    key: String,
    ranges: Vec<FieldRange>,
    sentinel: Option<SentinelPair>,
    severity: Severity,
    row_type_restriction: Option<String>,
    messages: SharedFormatter,
}

impl Default for NumericRangeCriterionBuilder {
    fn default() -> Self {
        Self {
            key: NUMERIC_RANGE_KEY.to_string(),
            ranges: Vec::new(),
            sentinel: None,
            severity: Severity::Error,
            row_type_restriction: None,
            messages: DefaultMessages::shared(),
        }
    }
}

impl NumericRangeCriterionBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn range(mut self, field: impl Into<String>, min: f64, max: f64) -> Self {
        self.ranges.push(FieldRange::new(field, min, max));
        self
    }

    pub fn sentinel(
        mut self,
        first_field: impl Into<String>,
        second_field: impl Into<String>,
        first_value: f64,
        second_value: f64,
    ) -> Self {
        self.sentinel = Some(SentinelPair {
            fields: (first_field.into(), second_field.into()),
            values: (first_value, second_value),
        });
        self
    }

    pub fn without_sentinel(mut self) -> Self {
        self.sentinel = None;
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn row_type_restriction(mut self, row_type: impl Into<String>) -> Self {
        let row_type = row_type.into();
        self.row_type_restriction = (!row_type.trim().is_empty()).then_some(row_type);
        self
    }

    pub fn messages(mut self, messages: SharedFormatter) -> Self {
        self.messages = messages;
        self
    }

    pub fn build(self) -> Result<NumericRangeCriterion> {
        if self.ranges.is_empty() {
            return Err(ValidatorError::configuration(format!(
                "criterion '{}' needs at least one range",
                self.key
            )));
        }
        if let Some(bad) = self
            .ranges
            .iter()
            .find(|r| !r.min.is_finite() || !r.max.is_finite() || r.min > r.max)
        {
            return Err(ValidatorError::configuration(format!(
                "invalid range [{}, {}] for field '{}'",
                bad.min, bad.max, bad.field
            )));
        }
        Ok(NumericRangeCriterion {
            key: self.key,
            ranges: self.ranges,
            sentinel: self.sentinel,
            severity: self.severity,
            row_type_restriction: self.row_type_restriction,
            messages: self.messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate(id: &str, lat: &str, lng: &str) -> Record {
        Record::new(id, terms::OCCURRENCE_ROW_TYPE)
            .with_field(terms::DECIMAL_LATITUDE, lat)
            .with_field(terms::DECIMAL_LONGITUDE, lng)
    }

    fn check(lat: &str, lng: &str) -> Option<ValidationResult> {
        let mut criterion = NumericRangeCriterion::coordinates().build().unwrap();
        criterion
            .validate(&coordinate("1", lat, lng), &EvaluationContext::Core)
            .unwrap()
    }

    #[test]
    fn test_valid_coordinates_produce_no_result() {
        assert!(check("45.5", "-73.6").is_none());
        assert!(check("-90", "180").is_none());
        assert!(check("", " ").is_none());
    }

    #[test]
    fn test_unparseable_values() {
        for (lat, lng) in [("a", "40"), ("70", "b"), ("NaN", "1")] {
            let result = check(lat, lng).expect("invalid value is reported");
            assert!(result.contains_category(ValidationType::RecordContentValue));
            assert!(!result.contains_category(ValidationType::RecordContentBounds));
        }
    }

    #[test]
    fn test_out_of_bounds_values() {
        for (lat, lng) in [("91", "120"), ("91", "40"), ("70", "181")] {
            let result = check(lat, lng).unwrap();
            assert!(result.contains_category(ValidationType::RecordContentBounds));
            assert_eq!(result.max_severity(), Some(Severity::Error));
        }
        assert_eq!(check("91", "181").unwrap().elements().len(), 2);
    }

    #[test]
    fn test_zero_zero_is_flagged_as_probable_default() {
        let result = check("0", "0").unwrap();
        assert_eq!(result.elements().len(), 1);
        assert_eq!(result.elements()[0].severity(), Severity::Warning);
        assert!(result.contains_message(
            &DefaultMessages.format(messages::NUMERIC_SENTINEL, &["0", "0"])
        ));
        assert!(check("0.0", "1").is_none());
    }

    #[test]
    fn test_custom_range_and_restriction() {
        let mut criterion = NumericRangeCriterion::builder()
            .key("depth")
            .range("minimumDepthInMeters", 0.0, 11_000.0)
            .row_type_restriction(terms::OCCURRENCE_ROW_TYPE)
            .severity(Severity::Warning)
            .build()
            .unwrap();
        let deep = Record::new("1", terms::OCCURRENCE_ROW_TYPE)
            .with_field("minimumDepthInMeters", "-3");
        let result = criterion
            .validate(&deep, &EvaluationContext::Core)
            .unwrap()
            .unwrap();
        assert_eq!(result.elements()[0].criterion_key(), "depth");
        assert_eq!(result.max_severity(), Some(Severity::Warning));

        let taxon = Record::new("2", terms::TAXON_ROW_TYPE).with_field("minimumDepthInMeters", "-3");
        assert!(criterion
            .validate(&taxon, &EvaluationContext::Core)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_build_rejects_bad_ranges() {
        assert!(NumericRangeCriterion::builder().build().is_err());
        assert!(matches!(
            NumericRangeCriterion::builder().range("x", 5.0, 1.0).build(),
            Err(ValidatorError::Configuration(_))
        ));
    }
}
