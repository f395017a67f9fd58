//! Completeness criterion: required fields must be present and truthy.

use super::transformation::{
    BoxedTransformation, MatchesPattern, NotBlank, OneOf, TransformationSpec,
};
use crate::core::{
    EvaluationContext, Record, RecordCriterion, Severity, ValidationResult,
    ValidationResultElement, ValidationType,
};
use crate::messages::{self, DefaultMessages, SharedFormatter};
use crate::prelude::*;
use tracing::debug;

pub const COMPLETENESS_KEY: &str = "completenessCriterion";

/// Checks that every configured transformation yields `true` for a record.
///
/// Unlike most criteria, completeness records passes: a record that fails no
/// transformation still produces a result, with no elements. Records excluded
/// by the row-type restriction produce no result at all.
///
/// # Examples
///
/// ```rust
/// use dwca_guard::core::{EvaluationContext, Record, RecordCriterion, Severity};
/// use dwca_guard::criteria::CompletenessCriterion;
///
/// # fn main() -> dwca_guard::prelude::Result<()> {
/// let mut criterion = CompletenessCriterion::builder()
///     .not_blank("scientificName")
///     .one_of("basisOfRecord", ["PreservedSpecimen", "HumanObservation"])
///     .severity(Severity::Warning)
///     .build()?;
///
/// let record = Record::new("occ-1", "Occurrence")
///     .with_field("scientificName", "")
///     .with_field("basisOfRecord", "HumanObservation");
///
/// let result = criterion.validate(&record, &EvaluationContext::Core)?.unwrap();
/// assert_eq!(result.elements().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CompletenessCriterion {
    key: String,
    transformations: Vec<BoxedTransformation>,
    severity: Severity,
    row_type_restriction: Option<String>,
    messages: SharedFormatter,
}

impl CompletenessCriterion {
    pub fn builder() -> CompletenessCriterionBuilder {
        CompletenessCriterionBuilder::default()
    }

    fn applies_to(&self, record: &Record) -> bool {
        match &self.row_type_restriction {
            Some(row_type) => row_type.eq_ignore_ascii_case(record.row_type()),
            None => true,
        }
    }
}

impl RecordCriterion for CompletenessCriterion {
    fn key(&self) -> &str {
        &self.key
    }

    fn validate(
        &mut self,
        record: &Record,
        context: &EvaluationContext,
    ) -> Result<Option<ValidationResult>> {
        if !self.applies_to(record) {
            return Ok(None);
        }

        let elements: Vec<_> = self
            .transformations
            .iter()
            .map(|t| t.transform(record))
            .filter(|outcome| outcome.data() != Some(&true))
            .map(|outcome| {
                ValidationResultElement::new(
                    &self.key,
                    ValidationType::RecordContentValue,
                    self.severity,
                    self.messages
                        .format(messages::COMPLETENESS_INCOMPLETE, &[outcome.field()]),
                )
            })
            .collect();

        if !elements.is_empty() {
            debug!(
                criterion.key = %self.key,
                record.id = %record.id(),
                failures = elements.len(),
                "Record incomplete"
            );
        }

        Ok(Some(ValidationResult::with_elements(
            record.id(),
            context.clone(),
            record.row_type(),
            elements,
        )))
    }
}

/// Builder for [`CompletenessCriterion`].
#[derive(Debug)]
pub struct CompletenessCriterionBuilder {
    key: String,
    transformations: Vec<BoxedTransformation>,
    severity: Severity,
    row_type_restriction: Option<String>,
    messages: SharedFormatter,
    error: Option<ValidatorError>,
}

impl Default for CompletenessCriterionBuilder {
    fn default() -> Self {
        Self {
            key: COMPLETENESS_KEY.to_string(),
            transformations: Vec::new(),
            severity: Severity::Error,
            row_type_restriction: None,
            messages: DefaultMessages::shared(),
            error: None,
        }
    }
}

impl CompletenessCriterionBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn transformation(mut self, transformation: BoxedTransformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    pub fn not_blank(self, field: impl Into<String>) -> Self {
        self.transformation(Box::new(NotBlank::new(field)))
    }

    pub fn one_of<I, S>(self, field: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.transformation(Box::new(OneOf::new(field, allowed)))
    }

    /// Adds a regex rule; an invalid pattern is reported by [`build`](Self::build).
    pub fn matches(mut self, field: impl Into<String>, pattern: &str) -> Self {
        match MatchesPattern::new(field, pattern) {
            Ok(t) => self.transformations.push(Box::new(t)),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Adds transformations from their declarative form.
    pub fn specs<'a>(mut self, specs: impl IntoIterator<Item = &'a TransformationSpec>) -> Self {
        for spec in specs {
            match spec.build() {
                Ok(t) => self.transformations.push(t),
                Err(e) => {
                    self.error.get_or_insert(e);
                }
            }
        }
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Only evaluate records of this row type (compared ignoring ASCII case).
    pub fn row_type_restriction(mut self, row_type: impl Into<String>) -> Self {
        let row_type = row_type.into();
        self.row_type_restriction = (!row_type.trim().is_empty()).then_some(row_type);
        self
    }

    pub fn messages(mut self, messages: SharedFormatter) -> Self {
        self.messages = messages;
        self
    }

    pub fn build(self) -> Result<CompletenessCriterion> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.transformations.is_empty() {
            return Err(ValidatorError::configuration(format!(
                "criterion '{}' needs at least one field",
                self.key
            )));
        }
        Ok(CompletenessCriterion {
            key: self.key,
            transformations: self.transformations,
            severity: self.severity,
            row_type_restriction: self.row_type_restriction,
            messages: self.messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::terms;

    fn occurrence(id: &str) -> Record {
        Record::new(id, terms::OCCURRENCE_ROW_TYPE)
    }

    #[test]
    fn test_complete_record_produces_passing_result() {
        let mut criterion = CompletenessCriterion::builder()
            .not_blank(terms::SCIENTIFIC_NAME)
            .not_blank(terms::BASIS_OF_RECORD)
            .build()
            .unwrap();
        let record = occurrence("1")
            .with_field(terms::SCIENTIFIC_NAME, "Puma concolor")
            .with_field(terms::BASIS_OF_RECORD, "HumanObservation");

        let result = criterion
            .validate(&record, &EvaluationContext::Core)
            .unwrap()
            .expect("completeness records passes");
        assert!(result.is_passed());
        assert_eq!(result.record_id(), "1");
    }

    #[test]
    fn test_each_failed_field_adds_an_element() {
        let mut criterion = CompletenessCriterion::builder()
            .not_blank(terms::SCIENTIFIC_NAME)
            .not_blank(terms::BASIS_OF_RECORD)
            .not_blank(terms::EVENT_DATE)
            .severity(Severity::Warning)
            .build()
            .unwrap();
        // blank name, missing basisOfRecord, present eventDate
        let record = occurrence("2")
            .with_field(terms::SCIENTIFIC_NAME, "  ")
            .with_field(terms::EVENT_DATE, "2020");

        let result = criterion
            .validate(&record, &EvaluationContext::Core)
            .unwrap()
            .unwrap();
        assert_eq!(result.elements().len(), 2);
        assert!(result
            .elements()
            .iter()
            .all(|e| e.category() == ValidationType::RecordContentValue
                && e.severity() == Severity::Warning
                && e.criterion_key() == COMPLETENESS_KEY));
        assert!(result.contains_message(
            &DefaultMessages.format(messages::COMPLETENESS_INCOMPLETE, &[terms::BASIS_OF_RECORD])
        ));
    }

    #[test]
    fn test_row_type_restriction_yields_not_applicable() {
        let mut criterion = CompletenessCriterion::builder()
            .not_blank(terms::SCIENTIFIC_NAME)
            .row_type_restriction(terms::TAXON_ROW_TYPE)
            .build()
            .unwrap();

        let outcome = criterion
            .validate(&occurrence("3"), &EvaluationContext::Core)
            .unwrap();
        assert!(outcome.is_none());

        let taxon = Record::new("t1", terms::TAXON_ROW_TYPE.to_uppercase());
        assert!(criterion
            .validate(&taxon, &EvaluationContext::Core)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_build_errors() {
        assert!(matches!(
            CompletenessCriterion::builder().build(),
            Err(ValidatorError::Configuration(_))
        ));
        assert!(CompletenessCriterion::builder()
            .matches("eventDate", "[")
            .build()
            .is_err());
    }
}
