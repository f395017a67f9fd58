//! Criterion contracts.

use super::{AggregationResult, EvaluationContext, Record, ValidationResult};
use crate::accumulator::ResultAccumulator;
use crate::prelude::*;
use std::fmt::Debug;

/// What a stream-spanning criterion reports at the end of its finalize phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// All deferred checks ran to completion.
    Complete,
    /// The finalize phase hit a recoverable failure; its findings may be
    /// incomplete for this context.
    Degraded { reason: String },
}

impl FinalizeOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FinalizeOutcome::Degraded { .. })
    }
}

/// A check run against every record of a stream.
///
/// Returning `Ok(None)` means the criterion does not apply to the record
/// (e.g. a row-type restriction excluded it). Returning a result with no
/// elements means the criterion applied and the record passed.
///
/// Criteria that need the whole stream (uniqueness) observe records in
/// [`validate`](RecordCriterion::validate) and report in
/// [`finalize`](RecordCriterion::finalize), which the
/// [`EvaluationChain`](super::EvaluationChain) calls exactly once per context
/// after the last record.
pub trait RecordCriterion: Debug + Send {
    /// Stable key, unique within one chain.
    fn key(&self) -> &str;

    fn validate(
        &mut self,
        record: &Record,
        context: &EvaluationContext,
    ) -> Result<Option<ValidationResult>>;

    /// The context this instance was built for, if it is tied to one.
    /// Chains refuse criteria bound to a different context.
    fn bound_context(&self) -> Option<&EvaluationContext> {
        None
    }

    /// Runs deferred, stream-level checks. Results go straight to the
    /// accumulator since they belong to no single record.
    fn finalize(
        &mut self,
        _context: &EvaluationContext,
        _accumulator: &dyn ResultAccumulator,
    ) -> Result<FinalizeOutcome> {
        Ok(FinalizeOutcome::Complete)
    }
}

/// A check producing one dataset-wide fact per context.
pub trait DatasetCriterion: Debug + Send {
    fn key(&self) -> &str;

    /// Per-record bookkeeping (counters and the like).
    fn observe(&mut self, _record: &Record) {}

    /// Called once after the last record of the context.
    fn evaluate(&mut self, context: &EvaluationContext) -> Result<Option<AggregationResult>>;
}

pub type BoxedRecordCriterion = Box<dyn RecordCriterion>;
pub type BoxedDatasetCriterion = Box<dyn DatasetCriterion>;
