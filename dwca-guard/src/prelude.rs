//! Prelude for commonly used types and traits in dwca-guard.

pub use crate::accumulator::{ResultAccumulator, SharedAccumulator};
pub use crate::error::{ErrorContext, Result, ValidatorError};
pub use crate::logging::LogConfig;
pub use crate::messages::{DefaultMessages, MessageFormatter, SharedFormatter};
