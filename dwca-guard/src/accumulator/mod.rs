//! Result accumulators: the thread-safe sinks every chain writes into.
//!
//! One accumulator is created per validation run and shared (as an
//! [`Arc<dyn ResultAccumulator>`](SharedAccumulator)) by the chains of every
//! evaluation context, which may run on different threads. Implementations
//! serialize internally so that `accumulate` is linearizable with respect to
//! the counts.
//!
//! ## Return values
//!
//! - `Ok(true)`: the result was stored.
//! - `Ok(false)`: the sink rejected the result without failing, e.g. because
//!   it is closed. Nothing was stored and no state changed.
//! - `Err(_)`: an unrecoverable storage problem such as an I/O failure.

mod in_memory;
mod json_lines;

pub use in_memory::InMemoryResultAccumulator;
pub use json_lines::JsonLinesResultAccumulator;

use crate::core::{AggregationResult, ValidationResult};
use crate::prelude::*;
use std::fmt::Debug;
use std::sync::Arc;

/// The kind of result being counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Validation,
    Aggregation,
}

/// Collects validation and aggregation results for one run.
pub trait ResultAccumulator: Debug + Send + Sync {
    /// Appends a record-level (or value-level) finding.
    fn accumulate_validation(&self, result: ValidationResult) -> Result<bool>;

    /// Appends a dataset-wide fact.
    fn accumulate_aggregation(&self, result: AggregationResult) -> Result<bool>;

    /// Total number of validation results accumulated so far.
    fn validation_result_count(&self) -> usize;

    /// Total number of aggregation results accumulated so far.
    fn aggregation_result_count(&self) -> usize;

    /// Releases the underlying storage. Calling it twice is a no-op.
    fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;

    /// Count by kind.
    fn count(&self, kind: ResultKind) -> usize {
        match kind {
            ResultKind::Validation => self.validation_result_count(),
            ResultKind::Aggregation => self.aggregation_result_count(),
        }
    }
}

/// Shared handle injected into every evaluation chain of a run.
pub type SharedAccumulator = Arc<dyn ResultAccumulator>;
