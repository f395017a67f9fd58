//! # dwca-guard - streaming validation for Darwin Core archives
//!
//! dwca-guard runs configurable per-record and per-dataset checks over the
//! record streams of a Darwin Core archive: one core stream plus any number
//! of extension streams sharing the core identifier. Every finding carries a
//! severity, the check that raised it, and the evaluation context (core or
//! extension row type) it belongs to.
//!
//! Parsing the archive itself is left to the caller. The pipeline is handed
//! ready-made [`Record`](core::Record)s and ordered criterion lists, either
//! built in code or from a YAML [`ValidationConfig`](config::ValidationConfig).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dwca_guard::prelude::*;
//! use dwca_guard::accumulator::InMemoryResultAccumulator;
//! use dwca_guard::core::{EvaluationChain, EvaluationContext, Record, Severity};
//! use dwca_guard::criteria::{CompletenessCriterion, NumericRangeCriterion, RecordCountCriterion};
//!
//! # fn main() -> dwca_guard::prelude::Result<()> {
//! let results = Arc::new(InMemoryResultAccumulator::new());
//!
//! let mut chain = EvaluationChain::builder(EvaluationContext::Core, results.clone())
//!     .record_criterion(
//!         CompletenessCriterion::builder()
//!             .not_blank("scientificName")
//!             .severity(Severity::Warning)
//!             .build()?,
//!     )
//!     .record_criterion(NumericRangeCriterion::coordinates().build()?)
//!     .dataset_criterion(RecordCountCriterion::new())
//!     .build()?;
//!
//! chain.process(
//!     &Record::new("occ-1", "http://rs.tdwg.org/dwc/terms/Occurrence")
//!         .with_field("scientificName", "Puma concolor")
//!         .with_field("decimalLatitude", "91")
//!         .with_field("decimalLongitude", "-73.6"),
//! )?;
//! let summary = chain.end_of_stream()?;
//!
//! assert_eq!(summary.records_processed, 1);
//! // one passing completeness result, one out-of-bounds coordinate
//! assert_eq!(results.validation_result_count(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`core`**: records, evaluation contexts, results, the criterion traits
//!   and the [`EvaluationChain`](core::EvaluationChain)
//! - **`accumulator`**: thread-safe result sinks shared by all chains of a run
//! - **`criteria`**: completeness, numeric range and dataset criteria
//! - **`uniqueness`**: the bounded-memory duplicate detector and its external sort
//! - **`config`**: YAML configuration and the criterion registry
//! - **`runner`**: one blocking worker per context on the tokio runtime
//! - **`messages`**: message catalogue used to render findings
//! - **`logging`**: `tracing` setup and per-concern log switches

pub mod accumulator;
pub mod config;
pub mod core;
pub mod criteria;
pub mod error;
pub mod logging;
pub mod messages;
pub mod prelude;
pub mod runner;
pub mod uniqueness;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
