//! Value transformations used by the completeness criterion.
//!
//! A transformation reads one field of a record and turns it into a typed
//! value. "Not transformed" (the field is absent or cannot be read) is kept
//! apart from a transformed `false`, though the completeness criterion
//! treats both as a failure.

use crate::core::Record;
use crate::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Outcome of applying a [`ValueTransformation`] to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationResult<T> {
    field: String,
    data: Option<T>,
}

impl<T> TransformationResult<T> {
    pub fn transformed(field: impl Into<String>, data: T) -> Self {
        Self {
            field: field.into(),
            data: Some(data),
        }
    }

    pub fn not_transformed(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            data: None,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn is_transformed(&self) -> bool {
        self.data.is_some()
    }
}

/// Reads and interprets one field of a record.
pub trait ValueTransformation<T>: Debug + Send + Sync {
    fn field(&self) -> &str;

    fn transform(&self, record: &Record) -> TransformationResult<T>;
}

pub type BoxedTransformation = Box<dyn ValueTransformation<bool>>;

/// `true` when the field holds non-whitespace text.
#[derive(Debug, Clone)]
pub struct NotBlank {
    field: String,
}

impl NotBlank {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl ValueTransformation<bool> for NotBlank {
    fn field(&self) -> &str {
        &self.field
    }

    fn transform(&self, record: &Record) -> TransformationResult<bool> {
        match record.value(&self.field) {
            Some(value) => TransformationResult::transformed(&self.field, !value.trim().is_empty()),
            None => TransformationResult::not_transformed(&self.field),
        }
    }
}

/// `true` when the (non-blank) field matches a regular expression.
#[derive(Debug, Clone)]
pub struct MatchesPattern {
    field: String,
    pattern: Regex,
}

impl MatchesPattern {
    pub fn new(field: impl Into<String>, pattern: &str) -> Result<Self> {
        let field = field.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            ValidatorError::configuration(format!("invalid pattern for field '{field}': {e}"))
        })?;
        Ok(Self { field, pattern })
    }
}

impl ValueTransformation<bool> for MatchesPattern {
    fn field(&self) -> &str {
        &self.field
    }

    fn transform(&self, record: &Record) -> TransformationResult<bool> {
        match record.non_blank_value(&self.field) {
            Some(value) => {
                TransformationResult::transformed(&self.field, self.pattern.is_match(value.trim()))
            }
            None => TransformationResult::not_transformed(&self.field),
        }
    }
}

/// `true` when the (non-blank) field equals one of the allowed values,
/// ignoring case.
#[derive(Debug, Clone)]
pub struct OneOf {
    field: String,
    allowed: Vec<String>,
}

impl OneOf {
    pub fn new<I, S>(field: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            field: field.into(),
            allowed: allowed
                .into_iter()
                .map(|v| v.as_ref().trim().to_lowercase())
                .collect(),
        }
    }
}

impl ValueTransformation<bool> for OneOf {
    fn field(&self) -> &str {
        &self.field
    }

    fn transform(&self, record: &Record) -> TransformationResult<bool> {
        match record.non_blank_value(&self.field) {
            Some(value) => {
                let value = value.trim().to_lowercase();
                TransformationResult::transformed(&self.field, self.allowed.contains(&value))
            }
            None => TransformationResult::not_transformed(&self.field),
        }
    }
}

/// Declarative form of a transformation, as written in configuration files.
///
/// ```yaml
/// - field: scientificName
/// - field: basisOfRecord
///   rule: oneOf
///   values: [PreservedSpecimen, HumanObservation]
/// - field: eventDate
///   rule: matches
///   pattern: '^\d{4}'
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformationSpec {
    pub field: String,
    #[serde(default)]
    pub rule: TransformationRule,
    /// Regular expression, required by `matches`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Allowed values, required by `oneOf`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformationRule {
    #[default]
    NotBlank,
    Matches,
    OneOf,
}

impl TransformationSpec {
    /// Shorthand for a `notBlank` rule on `field`.
    pub fn not_blank(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: TransformationRule::NotBlank,
            pattern: None,
            values: Vec::new(),
        }
    }

    pub fn build(&self) -> Result<BoxedTransformation> {
        let transformation: BoxedTransformation = match self.rule {
            TransformationRule::NotBlank => Box::new(NotBlank::new(&self.field)),
            TransformationRule::Matches => {
                let pattern = self.pattern.as_deref().ok_or_else(|| {
                    ValidatorError::configuration(format!(
                        "rule 'matches' on field '{}' requires a pattern",
                        self.field
                    ))
                })?;
                Box::new(MatchesPattern::new(&self.field, pattern)?)
            }
            TransformationRule::OneOf => {
                if self.values.is_empty() {
                    return Err(ValidatorError::configuration(format!(
                        "rule 'oneOf' on field '{}' requires at least one value",
                        self.field
                    )));
                }
                Box::new(OneOf::new(&self.field, &self.values))
            }
        };
        Ok(transformation)
    }
}
