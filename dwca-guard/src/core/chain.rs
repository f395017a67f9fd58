//! The evaluation chain: drives one stream through its criteria.

use super::{
    BoxedDatasetCriterion, BoxedRecordCriterion, DatasetCriterion, EvaluationContext,
    FinalizeOutcome, Record, RecordCriterion, ValidationResult,
};
use crate::accumulator::SharedAccumulator;
use crate::core::AggregationResult;
use crate::log_criterion;
use crate::logging::{truncate_field, LogConfig};
use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of a chain, and of every criterion it holds, for one context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainState {
    /// No record seen yet
    Idle,
    /// At least one record processed
    Observing,
    /// End of stream signalled; finalize phase running
    Finalizing,
    /// Finalize phase completed
    Done,
}

/// What happened while one context was evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub context: EvaluationContext,
    pub records_processed: u64,
    /// Number of (criterion, record) invocations that failed and were skipped
    pub criterion_failures: u64,
    /// Keys of criteria whose finalize phase reported degraded checking
    pub degraded_criteria: Vec<String>,
}

impl ChainSummary {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_criteria.is_empty()
    }
}

/// An ordered list of record and dataset criteria bound to one context.
///
/// ```rust
/// use std::sync::Arc;
/// use dwca_guard::accumulator::{InMemoryResultAccumulator, ResultAccumulator};
/// use dwca_guard::core::{EvaluationChain, EvaluationContext, Record};
/// use dwca_guard::criteria::{CompletenessCriterion, RecordCountCriterion};
///
/// # fn main() -> dwca_guard::prelude::Result<()> {
/// let acc = Arc::new(InMemoryResultAccumulator::new());
/// let mut chain = EvaluationChain::builder(EvaluationContext::Core, acc.clone())
///     .record_criterion(CompletenessCriterion::builder().not_blank("scientificName").build()?)
///     .dataset_criterion(RecordCountCriterion::new())
///     .build()?;
///
/// chain.process(&Record::new("1", "Occurrence").with_field("scientificName", "Puma concolor"))?;
/// let summary = chain.end_of_stream()?;
///
/// assert_eq!(summary.records_processed, 1);
/// assert_eq!(acc.validation_result_count(), 1);
/// assert_eq!(acc.aggregation_result_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct EvaluationChain {
    context: EvaluationContext,
    record_criteria: Vec<BoxedRecordCriterion>,
    dataset_criteria: Vec<BoxedDatasetCriterion>,
    accumulator: SharedAccumulator,
    log_config: LogConfig,
    state: ChainState,
    records_processed: u64,
    criterion_failures: u64,
}

impl EvaluationChain {
    pub fn builder(
        context: EvaluationContext,
        accumulator: SharedAccumulator,
    ) -> EvaluationChainBuilder {
        EvaluationChainBuilder {
            context,
            accumulator,
            record_criteria: Vec::new(),
            dataset_criteria: Vec::new(),
            log_config: LogConfig::default(),
        }
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Criterion keys in evaluation order, record criteria first.
    pub fn criterion_keys(&self) -> Vec<&str> {
        self.record_criteria
            .iter()
            .map(|c| c.key())
            .chain(self.dataset_criteria.iter().map(|c| c.key()))
            .collect()
    }

    /// Runs every record criterion, in order, against one record.
    ///
    /// A criterion that fails is logged and skipped; the others still run.
    /// Failing to store a result is not isolated and is returned.
    pub fn process(&mut self, record: &Record) -> Result<()> {
        match self.state {
            ChainState::Idle => self.state = ChainState::Observing,
            ChainState::Observing => {}
            ChainState::Finalizing | ChainState::Done => {
                return Err(ValidatorError::InvalidState(format!(
                    "record '{}' received after end of stream for {}",
                    record.id(),
                    self.context
                )));
            }
        }

        for criterion in self.record_criteria.iter_mut() {
            log_criterion!(
                self.log_config,
                criterion.key = %criterion.key(),
                record.id = %truncate_field(record.id(), self.log_config.max_field_length),
                "Evaluating record"
            );
            match criterion.validate(record, &self.context) {
                Ok(Some(result)) => store_validation(&self.accumulator, result)?,
                Ok(None) => {}
                Err(e) => {
                    self.criterion_failures += 1;
                    error!(
                        criterion.key = %criterion.key(),
                        record.id = %truncate_field(record.id(), self.log_config.max_field_length),
                        context = %self.context,
                        error = %e,
                        "Criterion failed on record, continuing with remaining criteria"
                    );
                }
            }
        }

        for criterion in self.dataset_criteria.iter_mut() {
            criterion.observe(record);
        }

        self.records_processed += 1;
        Ok(())
    }

    /// Processes every record of a stream, stopping at the first
    /// non-isolated error.
    pub fn process_stream<I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = Record>,
    {
        let before = self.records_processed;
        for record in records {
            self.process(&record)?;
        }
        Ok(self.records_processed - before)
    }

    /// Like [`process_stream`](Self::process_stream) for readers that can
    /// fail; a read error stops the stream and is returned.
    pub fn try_process_stream<I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        let before = self.records_processed;
        for record in records {
            self.process(&record?)?;
        }
        Ok(self.records_processed - before)
    }

    /// Runs the finalize phase of every record criterion, then evaluates
    /// every dataset criterion.
    ///
    /// Every criterion gets its finalize call even if an earlier one failed,
    /// so temp files and other resources are always released; the first
    /// error is returned afterwards.
    #[instrument(skip(self), fields(context = %self.context, records = self.records_processed))]
    pub fn end_of_stream(&mut self) -> Result<ChainSummary> {
        match self.state {
            ChainState::Idle | ChainState::Observing => self.state = ChainState::Finalizing,
            ChainState::Finalizing | ChainState::Done => {
                return Err(ValidatorError::InvalidState(format!(
                    "end of stream already signalled for {}",
                    self.context
                )));
            }
        }

        let mut first_error: Option<ValidatorError> = None;
        let mut degraded_criteria = Vec::new();

        for criterion in self.record_criteria.iter_mut() {
            match criterion.finalize(&self.context, self.accumulator.as_ref()) {
                Ok(FinalizeOutcome::Complete) => {}
                Ok(FinalizeOutcome::Degraded { reason }) => {
                    warn!(
                        criterion.key = %criterion.key(),
                        context = %self.context,
                        reason = %reason,
                        "Criterion finished with degraded checking"
                    );
                    degraded_criteria.push(criterion.key().to_string());
                }
                Err(e) => {
                    error!(criterion.key = %criterion.key(), error = %e, "Finalize phase failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        for criterion in self.dataset_criteria.iter_mut() {
            let outcome = criterion
                .evaluate(&self.context)
                .and_then(|aggregation| match aggregation {
                    Some(aggregation) => store_aggregation(&self.accumulator, aggregation),
                    None => Ok(()),
                });
            if let Err(e) = outcome {
                error!(criterion.key = %criterion.key(), error = %e, "Dataset criterion failed");
                first_error.get_or_insert(e);
            }
        }

        self.state = ChainState::Done;

        if let Some(e) = first_error {
            return Err(e);
        }

        let summary = ChainSummary {
            context: self.context.clone(),
            records_processed: self.records_processed,
            criterion_failures: self.criterion_failures,
            degraded_criteria,
        };
        info!(
            context = %summary.context,
            records = summary.records_processed,
            criterion.failures = summary.criterion_failures,
            degraded = summary.is_degraded(),
            "Evaluation chain finished"
        );
        Ok(summary)
    }
}

impl fmt::Debug for EvaluationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationChain")
            .field("context", &self.context)
            .field("criteria", &self.criterion_keys())
            .field("state", &self.state)
            .field("records_processed", &self.records_processed)
            .finish()
    }
}

fn store_validation(accumulator: &SharedAccumulator, result: ValidationResult) -> Result<()> {
    if accumulator.accumulate_validation(result)? {
        Ok(())
    } else {
        Err(ValidatorError::AccumulatorClosed)
    }
}

fn store_aggregation(accumulator: &SharedAccumulator, result: AggregationResult) -> Result<()> {
    if accumulator.accumulate_aggregation(result)? {
        Ok(())
    } else {
        Err(ValidatorError::AccumulatorClosed)
    }
}

/// Builder for [`EvaluationChain`].
pub struct EvaluationChainBuilder {
    context: EvaluationContext,
    accumulator: SharedAccumulator,
    record_criteria: Vec<BoxedRecordCriterion>,
    dataset_criteria: Vec<BoxedDatasetCriterion>,
    log_config: LogConfig,
}

impl EvaluationChainBuilder {
    pub fn record_criterion(mut self, criterion: impl RecordCriterion + 'static) -> Self {
        self.record_criteria.push(Box::new(criterion));
        self
    }

    pub fn dataset_criterion(mut self, criterion: impl DatasetCriterion + 'static) -> Self {
        self.dataset_criteria.push(Box::new(criterion));
        self
    }

    /// Appends already-boxed criteria, keeping their order.
    pub fn record_criteria(mut self, criteria: Vec<BoxedRecordCriterion>) -> Self {
        self.record_criteria.extend(criteria);
        self
    }

    pub fn dataset_criteria(mut self, criteria: Vec<BoxedDatasetCriterion>) -> Self {
        self.dataset_criteria.extend(criteria);
        self
    }

    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Builds the chain, rejecting duplicate criterion keys and criteria
    /// bound to another context.
    pub fn build(self) -> Result<EvaluationChain> {
        for criterion in &self.record_criteria {
            if let Some(bound) = criterion.bound_context() {
                if bound != &self.context {
                    return Err(ValidatorError::configuration(format!(
                        "criterion '{}' is bound to {bound} but the chain evaluates {}",
                        criterion.key(),
                        self.context
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        let keys = self
            .record_criteria
            .iter()
            .map(|c| c.key())
            .chain(self.dataset_criteria.iter().map(|c| c.key()));
        for key in keys {
            if !seen.insert(key) {
                return Err(ValidatorError::configuration(format!(
                    "criterion key '{key}' is registered more than once for {}",
                    self.context
                )));
            }
        }

        debug!(
            context = %self.context,
            record_criteria = self.record_criteria.len(),
            dataset_criteria = self.dataset_criteria.len(),
            "Evaluation chain built"
        );

        Ok(EvaluationChain {
            context: self.context,
            record_criteria: self.record_criteria,
            dataset_criteria: self.dataset_criteria,
            accumulator: self.accumulator,
            log_config: self.log_config,
            state: ChainState::Idle,
            records_processed: 0,
            criterion_failures: 0,
        })
    }
}
