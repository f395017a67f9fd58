//! Dataset criteria: one aggregated fact per context.

use crate::core::{AggregationResult, DatasetCriterion, EvaluationContext, Record};
use crate::prelude::*;

pub const RECORD_COUNT_KEY: &str = "recordCount";

/// Counts the records of a context.
#[derive(Debug, Clone)]
pub struct RecordCountCriterion {
    key: String,
    count: u64,
}

impl Default for RecordCountCriterion {
    fn default() -> Self {
        Self {
            key: RECORD_COUNT_KEY.to_string(),
            count: 0,
        }
    }
}

impl RecordCountCriterion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

impl DatasetCriterion for RecordCountCriterion {
    fn key(&self) -> &str {
        &self.key
    }

    fn observe(&mut self, _record: &Record) {
        self.count += 1;
    }

    fn evaluate(&mut self, context: &EvaluationContext) -> Result<Option<AggregationResult>> {
        Ok(Some(
            AggregationResult::new(&self.key, self.count, context.clone()).erase(),
        ))
    }
}

/// Share of records holding a non-blank value for one field, as a ratio in
/// `[0, 1]`. Produces nothing for an empty stream.
#[derive(Debug, Clone)]
pub struct FieldCoverageCriterion {
    field: String,
    key: String,
    total: u64,
    covered: u64,
}

impl FieldCoverageCriterion {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            key: format!("{field}.coverage"),
            field,
            total: 0,
            covered: 0,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

impl DatasetCriterion for FieldCoverageCriterion {
    fn key(&self) -> &str {
        &self.key
    }

    fn observe(&mut self, record: &Record) {
        self.total += 1;
        if record.non_blank_value(&self.field).is_some() {
            self.covered += 1;
        }
    }

    fn evaluate(&mut self, context: &EvaluationContext) -> Result<Option<AggregationResult>> {
        if self.total == 0 {
            return Ok(None);
        }
        let ratio = self.covered as f64 / self.total as f64;
        Ok(Some(
            AggregationResult::new(&self.key, ratio, context.clone()).erase(),
        ))
    }
}
