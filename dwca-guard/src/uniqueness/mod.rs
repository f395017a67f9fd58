//! Bounded-memory duplicate detection.
//!
//! [`UniquenessEvaluator`] is a two-phase record criterion. While records
//! stream through the chain it only collects values, keeping at most
//! `buffer_threshold` of them in memory and appending the rest to a private
//! spill file. At end of stream it sorts the spill file on disk and reports
//! every value equal (ignoring case) to the one before it.
//!
//! ```text
//! validate ──► buffer ──(threshold)──► <uuid>.txt
//!                                          │ finalize
//!                                          ▼
//!                          external_sort ──► <uuid>_sorted.txt ──► duplicate scan ──► accumulator
//! ```
//!
//! Both files are deleted when finalize returns and, failing that, when the
//! evaluator is dropped.

pub mod sort;
mod spill;

pub use sort::{external_sort, LineTerminator, SortOptions, SortStats};
pub use spill::{escape, unescape};

use crate::accumulator::ResultAccumulator;
use crate::core::{
    AggregationResult, EvaluationContext, FinalizeOutcome, Record, RecordCriterion, Severity,
    ValidationResult, ValidationResultElement, ValidationType,
};
use crate::log_spill_op;
use crate::logging::LogConfig;
use crate::messages::{self, DefaultMessages, SharedFormatter};
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use spill::SpillFiles;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

const ID_LABEL: &str = "coreId";

/// Tuning of the uniqueness evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniquenessSettings {
    /// Values buffered in memory before a spill
    pub buffer_threshold: usize,
    /// Directory for spill files; the system temp directory when unset
    pub spill_dir: Option<PathBuf>,
    pub line_terminator: LineTerminator,
    /// Lines per in-memory run of the external sort
    pub sort_chunk_size: usize,
}

impl Default for UniquenessSettings {
    fn default() -> Self {
        Self {
            buffer_threshold: 1000,
            spill_dir: None,
            line_terminator: LineTerminator::Lf,
            sort_chunk_size: SortOptions::default().chunk_size,
        }
    }
}

impl UniquenessSettings {
    pub fn spill_dir(&self) -> PathBuf {
        self.spill_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    fn sort_options(&self) -> SortOptions {
        SortOptions::default()
            .with_chunk_size(self.sort_chunk_size)
            .with_line_terminator(self.line_terminator)
            .with_temp_dir(self.spill_dir())
    }
}

/// Reports values of one field (or record ids) that occur more than once in
/// a context. A run of K equal values yields K-1 results.
///
/// Blank and missing values are skipped, so repeated empty identifiers are
/// never reported here; pair the evaluator with a completeness check on the
/// same field to catch them.
///
/// An evaluator belongs to the context it was built for. Records or a
/// finalize call from any other context are an [`ValidatorError::InvalidState`]
/// error, and [`EvaluationChain`](crate::core::EvaluationChain) refuses to
/// build with an evaluator bound to another context.
pub struct UniquenessEvaluator {
    key: String,
    context: EvaluationContext,
    field: Option<String>,
    settings: UniquenessSettings,
    messages: SharedFormatter,
    log_config: LogConfig,
    buffer: Vec<String>,
    writer: Option<BufWriter<File>>,
    files: Option<SpillFiles>,
    row_type: Option<String>,
    values_seen: u64,
    spill_failure: Option<String>,
}

impl UniquenessEvaluator {
    pub fn builder() -> UniquenessEvaluatorBuilder {
        UniquenessEvaluatorBuilder::default()
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    /// Field being checked, `None` when record ids are checked.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn values_seen(&self) -> u64 {
        self.values_seen
    }

    /// Path of the unsorted spill file while the evaluator is live.
    pub fn spill_path(&self) -> Option<&Path> {
        self.files.as_ref().map(|f| f.unsorted())
    }

    fn label(&self) -> &str {
        self.field.as_deref().unwrap_or(ID_LABEL)
    }

    fn spill_buffer(&mut self) -> std::io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "spill file already closed")
        })?;
        let terminator = self.settings.line_terminator.as_str();
        for value in self.buffer.drain(..) {
            writer.write_all(escape(&value).as_bytes())?;
            writer.write_all(terminator.as_bytes())?;
        }
        writer.flush()
    }

    fn spill(&mut self) {
        let count = self.buffer.len();
        match self.spill_buffer() {
            Ok(()) => {
                log_spill_op!(
                    self.log_config,
                    criterion.key = %self.key,
                    values = count,
                    "Spilled buffer to disk"
                );
            }
            Err(e) => {
                warn!(
                    criterion.key = %self.key,
                    context = %self.context,
                    error = %e,
                    "Spill failed, further values of this context are ignored"
                );
                self.buffer.clear();
                self.writer = None;
                self.spill_failure = Some(format!("spill write failed: {e}"));
            }
        }
    }

    /// Flushes, sorts and scans. Errors from the accumulator are returned
    /// as-is; anything else is an I/O problem the caller degrades on.
    fn check_duplicates(&mut self, accumulator: &dyn ResultAccumulator) -> Result<u64> {
        if let Some(failure) = &self.spill_failure {
            return Err(ValidatorError::Sort(failure.clone()));
        }
        if !self.buffer.is_empty() {
            self.spill_buffer()?;
        }
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        let files = self
            .files
            .as_ref()
            .ok_or_else(|| ValidatorError::InvalidState("spill files already released".into()))?;

        let stats = external_sort(files.unsorted(), files.sorted(), &self.settings.sort_options())?;
        debug!(criterion.key = %self.key, lines = stats.lines, runs = stats.runs, "Spill file sorted");

        let reader = BufReader::new(File::open(files.sorted())?);
        let mut previous: Option<String> = None;
        let mut duplicates = 0;
        for line in reader.lines() {
            let line = line?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            let key = line.to_lowercase();
            if previous.as_deref() == Some(key.as_str()) {
                self.report_duplicate(&unescape(line), accumulator)?;
                duplicates += 1;
            }
            previous = Some(key);
        }
        Ok(duplicates)
    }

    fn report_duplicate(&self, value: &str, accumulator: &dyn ResultAccumulator) -> Result<()> {
        let element = ValidationResultElement::new(
            &self.key,
            ValidationType::FieldUniqueness,
            Severity::Error,
            self.messages
                .format(messages::UNIQUENESS_DUPLICATE, &[value, self.label()]),
        );
        let result = ValidationResult::with_elements(
            value,
            self.context.clone(),
            self.row_type.clone().unwrap_or_default(),
            vec![element],
        );
        if accumulator.accumulate_validation(result)? {
            Ok(())
        } else {
            Err(ValidatorError::AccumulatorClosed)
        }
    }

    fn report_degraded(&self, reason: &str, accumulator: &dyn ResultAccumulator) -> Result<()> {
        let message = self
            .messages
            .format(messages::UNIQUENESS_DEGRADED, &[self.label(), reason]);
        let aggregation =
            AggregationResult::new(format!("{}.degraded", self.key), message, self.context.clone())
                .with_severity(Severity::Warning)
                .erase();
        if accumulator.accumulate_aggregation(aggregation)? {
            Ok(())
        } else {
            Err(ValidatorError::AccumulatorClosed)
        }
    }

    fn wrong_context(&self, context: &EvaluationContext) -> ValidatorError {
        ValidatorError::InvalidState(format!(
            "uniqueness evaluator '{}' belongs to {} but was given {context}",
            self.key, self.context
        ))
    }

    fn release_files(&mut self) {
        if let Some(mut files) = self.files.take() {
            if let Err(e) = files.remove() {
                warn!(criterion.key = %self.key, error = %e, "Failed to remove spill files");
            }
        }
    }
}

impl RecordCriterion for UniquenessEvaluator {
    fn key(&self) -> &str {
        &self.key
    }

    /// Collects the value; never produces a result.
    fn validate(
        &mut self,
        record: &Record,
        context: &EvaluationContext,
    ) -> Result<Option<ValidationResult>> {
        if context != &self.context {
            return Err(self.wrong_context(context));
        }
        if self.files.is_none() || self.spill_failure.is_some() {
            return Ok(None);
        }
        if self.row_type.is_none() {
            self.row_type = Some(record.row_type().to_string());
        }

        let value = match &self.field {
            Some(field) => record.non_blank_value(field),
            None => Some(record.id()).filter(|id| !id.trim().is_empty()),
        };
        if let Some(value) = value {
            self.buffer.push(value.to_string());
            self.values_seen += 1;
            if self.buffer.len() >= self.settings.buffer_threshold {
                self.spill();
            }
        }
        Ok(None)
    }

    fn bound_context(&self) -> Option<&EvaluationContext> {
        Some(&self.context)
    }

    #[instrument(skip(self, context, accumulator), fields(key = %self.key, context = %self.context))]
    fn finalize(
        &mut self,
        context: &EvaluationContext,
        accumulator: &dyn ResultAccumulator,
    ) -> Result<FinalizeOutcome> {
        if self.files.is_none() {
            return Err(ValidatorError::InvalidState(format!(
                "uniqueness evaluator '{}' already finalized",
                self.key
            )));
        }
        if context != &self.context {
            self.release_files();
            return Err(self.wrong_context(context));
        }

        let outcome = self.check_duplicates(accumulator);
        self.buffer = Vec::new();
        self.writer = None;
        self.release_files();

        match outcome {
            Ok(duplicates) => {
                debug!(duplicates, values = self.values_seen, "Uniqueness check complete");
                Ok(FinalizeOutcome::Complete)
            }
            Err(e) if e.is_accumulation() => Err(e),
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, "Uniqueness check degraded");
                self.report_degraded(&reason, accumulator)?;
                Ok(FinalizeOutcome::Degraded { reason })
            }
        }
    }
}

impl std::fmt::Debug for UniquenessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniquenessEvaluator")
            .field("key", &self.key)
            .field("context", &self.context)
            .field("field", &self.label())
            .field("buffered", &self.buffer.len())
            .field("values_seen", &self.values_seen)
            .field("spill_path", &self.spill_path())
            .finish()
    }
}

/// Builder for [`UniquenessEvaluator`]. A context is mandatory.
#[derive(Debug)]
pub struct UniquenessEvaluatorBuilder {
    key: Option<String>,
    context: Option<EvaluationContext>,
    field: Option<String>,
    settings: UniquenessSettings,
    messages: SharedFormatter,
    log_config: LogConfig,
}

impl Default for UniquenessEvaluatorBuilder {
    fn default() -> Self {
        Self {
            key: None,
            context: None,
            field: None,
            settings: UniquenessSettings::default(),
            messages: DefaultMessages::shared(),
            log_config: LogConfig::default(),
        }
    }
}

impl UniquenessEvaluatorBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn context(mut self, context: EvaluationContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Field whose values must be unique. Without one, record ids are checked.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn settings(mut self, settings: UniquenessSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn buffer_threshold(mut self, threshold: usize) -> Self {
        self.settings.buffer_threshold = threshold;
        self
    }

    pub fn spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.spill_dir = Some(dir.into());
        self
    }

    pub fn messages(mut self, messages: SharedFormatter) -> Self {
        self.messages = messages;
        self
    }

    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Validates the parameters and opens the spill file.
    pub fn build(self) -> Result<UniquenessEvaluator> {
        let context = self.context.ok_or_else(|| {
            ValidatorError::configuration("uniqueness evaluator requires an evaluation context")
        })?;
        if self.settings.buffer_threshold == 0 || self.settings.sort_chunk_size == 0 {
            return Err(ValidatorError::configuration(
                "uniqueness buffer threshold and sort chunk size must be positive",
            ));
        }
        if matches!(&self.field, Some(f) if f.trim().is_empty()) {
            return Err(ValidatorError::configuration("uniqueness field must not be blank"));
        }

        let dir = self.settings.spill_dir();
        let (files, file) = SpillFiles::create(&dir).map_err(|e| {
            ValidatorError::configuration(format!(
                "cannot open spill file in {}: {e}",
                dir.display()
            ))
        })?;
        let key = self.key.unwrap_or_else(|| {
            format!("uniqueness:{}", self.field.as_deref().unwrap_or(ID_LABEL))
        });

        Ok(UniquenessEvaluator {
            key,
            context,
            field: self.field,
            buffer: Vec::with_capacity(self.settings.buffer_threshold.min(4096)),
            settings: self.settings,
            messages: self.messages,
            log_config: self.log_config,
            writer: Some(BufWriter::new(file)),
            files: Some(files),
            row_type: None,
            values_seen: 0,
            spill_failure: None,
        })
    }
}
