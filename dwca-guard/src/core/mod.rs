//! Core types of the validation pipeline.
//!
//! ## Overview
//!
//! - **[`Record`]**: one row of the core file or of an extension file
//! - **[`EvaluationContext`]**: which stream a record or result belongs to
//! - **[`RecordCriterion`] / [`DatasetCriterion`]**: the two criterion contracts
//! - **[`ValidationResult`] / [`AggregationResult`]**: what criteria produce
//! - **[`EvaluationChain`]**: drives one stream through an ordered list of criteria
//!
//! ## Architecture
//!
//! ```text
//! Archive
//!     ├── core stream ──────────► EvaluationChain (Core)
//!     │                               ├── RecordCriterion 1
//!     │                               ├── RecordCriterion 2 (two-phase: uniqueness)
//!     │                               └── DatasetCriterion 1
//!     └── extension stream(s) ──► EvaluationChain (Extension(rowType))
//!                                     └── ...
//!                     all chains ──► one shared ResultAccumulator
//! ```
//!
//! ## Chain lifecycle
//!
//! `Idle -> Observing -> Finalizing -> Done`. Records are accepted in `Idle`
//! and `Observing`; [`EvaluationChain::end_of_stream`] moves the chain through
//! `Finalizing` to `Done` exactly once.

mod chain;
mod context;
mod criterion;
mod record;
mod result;
mod severity;

pub use chain::{ChainState, ChainSummary, EvaluationChain, EvaluationChainBuilder};
pub use context::EvaluationContext;
pub use criterion::{
    BoxedDatasetCriterion, BoxedRecordCriterion, DatasetCriterion, FinalizeOutcome,
    RecordCriterion,
};
pub use record::{terms, Record};
pub use result::{
    AggregationResult, AggregationValue, ValidationResult, ValidationResultElement,
    ValidationType,
};
pub use severity::Severity;
