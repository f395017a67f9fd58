//! Name-to-factory registry turning [`CriterionSpec`]s into criteria.

use super::model::CriterionSpec;
use crate::core::{BoxedDatasetCriterion, BoxedRecordCriterion, EvaluationContext, Severity};
use crate::criteria::{
    CompletenessCriterion, FieldCoverageCriterion, FieldRange, NumericRangeCriterion,
    RecordCountCriterion, SentinelPair, TransformationSpec,
};
use crate::prelude::*;
use crate::uniqueness::{UniquenessEvaluator, UniquenessSettings};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Everything a factory may need to build one criterion.
pub struct BuildInput<'a> {
    pub spec: &'a CriterionSpec,
    pub context: &'a EvaluationContext,
    pub settings: &'a UniquenessSettings,
    pub messages: &'a SharedFormatter,
    pub log_config: &'a LogConfig,
}

pub type RecordFactory =
    Arc<dyn Fn(&BuildInput<'_>) -> Result<BoxedRecordCriterion> + Send + Sync>;
pub type DatasetFactory =
    Arc<dyn Fn(&BuildInput<'_>) -> Result<BoxedDatasetCriterion> + Send + Sync>;

/// Maps criterion type names, as used in configuration, to factories.
///
/// [`CriterionRegistry::with_builtins`] knows `completeness`, `numericRange`,
/// `coordinates`, `uniqueness`, `recordCount` and `fieldCoverage`. Callers may
/// register their own types; registering an existing name replaces it.
#[derive(Clone)]
pub struct CriterionRegistry {
    record: HashMap<String, RecordFactory>,
    dataset: HashMap<String, DatasetFactory>,
    messages: SharedFormatter,
    log_config: LogConfig,
}

impl Default for CriterionRegistry {
    fn default() -> Self {
        Self {
            record: HashMap::new(),
            dataset: HashMap::new(),
            messages: DefaultMessages::shared(),
            log_config: LogConfig::default(),
        }
    }
}

impl fmt::Debug for CriterionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut record: Vec<_> = self.record.keys().collect();
        let mut dataset: Vec<_> = self.dataset.keys().collect();
        record.sort();
        dataset.sort();
        f.debug_struct("CriterionRegistry")
            .field("record", &record)
            .field("dataset", &dataset)
            .finish()
    }
}

impl CriterionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_record("completeness", build_completeness);
        registry.register_record("numericRange", build_numeric_range);
        registry.register_record("coordinates", build_coordinates);
        registry.register_record("uniqueness", build_uniqueness);
        registry.register_dataset("recordCount", build_record_count);
        registry.register_dataset("fieldCoverage", build_field_coverage);
        registry
    }

    /// Formatter handed to every criterion this registry builds.
    pub fn with_messages(mut self, messages: SharedFormatter) -> Self {
        self.messages = messages;
        self
    }

    /// Logging switches handed to every criterion this registry builds.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.log_config
    }

    pub fn register_record<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&BuildInput<'_>) -> Result<BoxedRecordCriterion> + Send + Sync + 'static,
    {
        self.record.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_dataset<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&BuildInput<'_>) -> Result<BoxedDatasetCriterion> + Send + Sync + 'static,
    {
        self.dataset.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn has_record(&self, name: &str) -> bool {
        self.record.contains_key(name)
    }

    pub fn has_dataset(&self, name: &str) -> bool {
        self.dataset.contains_key(name)
    }

    pub fn build_record(
        &self,
        spec: &CriterionSpec,
        context: &EvaluationContext,
        settings: &UniquenessSettings,
    ) -> Result<BoxedRecordCriterion> {
        let factory = self.record.get(&spec.kind).ok_or_else(|| {
            ValidatorError::configuration(format!("unknown record criterion type '{}'", spec.kind))
        })?;
        let criterion = factory(&BuildInput {
            spec,
            context,
            settings,
            messages: &self.messages,
            log_config: &self.log_config,
        })
        .with_context(|| format!("building '{}' for {context}", spec.kind))?;
        debug!(
            criterion.kind = %spec.kind,
            criterion.key = %criterion.key(),
            context = %context,
            "Built record criterion"
        );
        Ok(criterion)
    }

    pub fn build_dataset(
        &self,
        spec: &CriterionSpec,
        context: &EvaluationContext,
    ) -> Result<BoxedDatasetCriterion> {
        let factory = self.dataset.get(&spec.kind).ok_or_else(|| {
            ValidatorError::configuration(format!("unknown dataset criterion type '{}'", spec.kind))
        })?;
        let settings = UniquenessSettings::default();
        let criterion = factory(&BuildInput {
            spec,
            context,
            settings: &settings,
            messages: &self.messages,
            log_config: &self.log_config,
        })
        .with_context(|| format!("building '{}' for {context}", spec.kind))?;
        debug!(
            criterion.kind = %spec.kind,
            criterion.key = %criterion.key(),
            context = %context,
            "Built dataset criterion"
        );
        Ok(criterion)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompletenessOptions {
    fields: Vec<TransformationSpec>,
    #[serde(default)]
    row_type: Option<String>,
    #[serde(default)]
    severity: Severity,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumericRangeOptions {
    ranges: Vec<FieldRange>,
    #[serde(default)]
    sentinel: Option<SentinelPair>,
    #[serde(default)]
    row_type: Option<String>,
    #[serde(default)]
    severity: Severity,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CoordinatesOptions {
    flag_zero_zero: bool,
    row_type: Option<String>,
    severity: Severity,
}

impl Default for CoordinatesOptions {
    fn default() -> Self {
        Self {
            flag_zero_zero: true,
            row_type: None,
            severity: Severity::Error,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct UniquenessOptions {
    field: Option<String>,
    buffer_threshold: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldCoverageOptions {
    field: String,
}

fn build_completeness(input: &BuildInput<'_>) -> Result<BoxedRecordCriterion> {
    let options: CompletenessOptions = input.spec.options()?;
    let mut builder = CompletenessCriterion::builder()
        .specs(&options.fields)
        .severity(options.severity)
        .messages(input.messages.clone());
    if let Some(row_type) = options.row_type {
        builder = builder.row_type_restriction(row_type);
    }
    if let Some(key) = &input.spec.key {
        builder = builder.key(key);
    }
    Ok(Box::new(builder.build()?))
}

fn build_numeric_range(input: &BuildInput<'_>) -> Result<BoxedRecordCriterion> {
    let options: NumericRangeOptions = input.spec.options()?;
    let mut builder = NumericRangeCriterion::builder()
        .severity(options.severity)
        .messages(input.messages.clone());
    for range in options.ranges {
        builder = builder.range(range.field, range.min, range.max);
    }
    if let Some(SentinelPair { fields, values }) = options.sentinel {
        builder = builder.sentinel(fields.0, fields.1, values.0, values.1);
    }
    if let Some(row_type) = options.row_type {
        builder = builder.row_type_restriction(row_type);
    }
    if let Some(key) = &input.spec.key {
        builder = builder.key(key);
    }
    Ok(Box::new(builder.build()?))
}

fn build_coordinates(input: &BuildInput<'_>) -> Result<BoxedRecordCriterion> {
    let options: CoordinatesOptions = input.spec.options()?;
    let mut builder = NumericRangeCriterion::coordinates()
        .severity(options.severity)
        .messages(input.messages.clone());
    if !options.flag_zero_zero {
        builder = builder.without_sentinel();
    }
    if let Some(row_type) = options.row_type {
        builder = builder.row_type_restriction(row_type);
    }
    if let Some(key) = &input.spec.key {
        builder = builder.key(key);
    }
    Ok(Box::new(builder.build()?))
}

fn build_uniqueness(input: &BuildInput<'_>) -> Result<BoxedRecordCriterion> {
    let options: UniquenessOptions = input.spec.options()?;
    let mut settings = input.settings.clone();
    if let Some(threshold) = options.buffer_threshold {
        settings.buffer_threshold = threshold;
    }
    let mut builder = UniquenessEvaluator::builder()
        .context(input.context.clone())
        .settings(settings)
        .messages(input.messages.clone())
        .log_config(input.log_config.clone());
    if let Some(field) = options.field {
        builder = builder.field(field);
    }
    if let Some(key) = &input.spec.key {
        builder = builder.key(key);
    }
    Ok(Box::new(builder.build()?))
}

fn build_record_count(input: &BuildInput<'_>) -> Result<BoxedDatasetCriterion> {
    let criterion = match &input.spec.key {
        Some(key) => RecordCountCriterion::new().with_key(key),
        None => RecordCountCriterion::new(),
    };
    Ok(Box::new(criterion))
}

fn build_field_coverage(input: &BuildInput<'_>) -> Result<BoxedDatasetCriterion> {
    let options: FieldCoverageOptions = input.spec.options()?;
    if options.field.trim().is_empty() {
        return Err(ValidatorError::configuration("fieldCoverage requires a field"));
    }
    let criterion = FieldCoverageCriterion::new(options.field);
    Ok(Box::new(match &input.spec.key {
        Some(key) => criterion.with_key(key),
        None => criterion,
    }))
}
