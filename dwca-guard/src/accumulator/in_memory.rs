//! In-memory accumulator, the default sink for tests and small archives.

use super::ResultAccumulator;
use crate::core::{AggregationResult, EvaluationContext, ValidationResult};
use crate::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    closed: bool,
    validation: Vec<ValidationResult>,
    aggregation: Vec<AggregationResult>,
    validation_count: usize,
    aggregation_count: usize,
}

/// Keeps every result in memory behind a single mutex.
///
/// Counts survive [`close`](ResultAccumulator::close); the stored results do
/// not, so snapshots must be taken before the run is closed.
///
/// ```rust
/// use dwca_guard::accumulator::{InMemoryResultAccumulator, ResultAccumulator};
/// use dwca_guard::core::{EvaluationContext, ValidationResult};
///
/// let acc = InMemoryResultAccumulator::new();
/// assert!(acc.accumulate_validation(ValidationResult::passed("1", EvaluationContext::Core, "rt")).unwrap());
/// acc.close().unwrap();
/// assert!(!acc.accumulate_validation(ValidationResult::passed("2", EvaluationContext::Core, "rt")).unwrap());
/// assert_eq!(acc.validation_result_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultAccumulator {
    state: Arc<Mutex<State>>,
}

impl InMemoryResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave `State` half-updated: every
    // mutation is a single push plus a counter bump.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of all validation results in accumulation order.
    pub fn validation_results(&self) -> Vec<ValidationResult> {
        self.lock().validation.clone()
    }

    /// Snapshot of all aggregation results in accumulation order.
    pub fn aggregation_results(&self) -> Vec<AggregationResult> {
        self.lock().aggregation.clone()
    }

    /// Validation results originating from one context.
    pub fn validation_results_for(&self, context: &EvaluationContext) -> Vec<ValidationResult> {
        self.lock()
            .validation
            .iter()
            .filter(|r| r.context() == context)
            .cloned()
            .collect()
    }

    /// Looks up an aggregation by key and context.
    pub fn aggregation(&self, key: &str, context: &EvaluationContext) -> Option<AggregationResult> {
        self.lock()
            .aggregation
            .iter()
            .find(|a| a.key() == key && a.context() == context)
            .cloned()
    }
}

impl ResultAccumulator for InMemoryResultAccumulator {
    fn accumulate_validation(&self, result: ValidationResult) -> Result<bool> {
        let mut state = self.lock();
        if state.closed {
            return Ok(false);
        }
        state.validation.push(result);
        state.validation_count += 1;
        Ok(true)
    }

    fn accumulate_aggregation(&self, result: AggregationResult) -> Result<bool> {
        let mut state = self.lock();
        if state.closed {
            return Ok(false);
        }
        state.aggregation.push(result);
        state.aggregation_count += 1;
        Ok(true)
    }

    fn validation_result_count(&self) -> usize {
        self.lock().validation_count
    }

    fn aggregation_result_count(&self) -> usize {
        self.lock().aggregation_count
    }

    fn close(&self) -> Result<()> {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            state.validation = Vec::new();
            state.aggregation = Vec::new();
            debug!(
                accumulator.validation = state.validation_count,
                accumulator.aggregation = state.aggregation_count,
                "In-memory accumulator closed"
            );
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
