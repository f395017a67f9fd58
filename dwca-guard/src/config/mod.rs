//! Declarative configuration of validation runs.
//!
//! A [`ValidationConfig`] lists, per evaluation context, which criteria to
//! run and with what options. A [`CriterionRegistry`] maps each criterion
//! `type` to a factory, and [`ValidationConfig::build_chains`] turns the
//! whole document into ready [`EvaluationChain`](crate::core::EvaluationChain)s.
//!
//! ```rust
//! use std::sync::Arc;
//! use dwca_guard::accumulator::InMemoryResultAccumulator;
//! use dwca_guard::config::{CriterionRegistry, ValidationConfig};
//!
//! # fn main() -> dwca_guard::prelude::Result<()> {
//! let config = ValidationConfig::from_yaml(
//!     r#"
//! core:
//!   record_criteria:
//!     - type: coordinates
//!   dataset_criteria:
//!     - type: recordCount
//! "#,
//! )?;
//! let chains = config.build_chains(
//!     &CriterionRegistry::with_builtins(),
//!     Arc::new(InMemoryResultAccumulator::new()),
//! )?;
//! assert_eq!(chains.len(), 1);
//! # Ok(())
//! # }
//! ```

mod model;
mod registry;

pub use model::{ContextConfig, CriterionSpec, ValidationConfig};
pub use registry::{BuildInput, CriterionRegistry, DatasetFactory, RecordFactory};
pub use crate::uniqueness::{LineTerminator, UniquenessSettings};
