//! Error types for the dwca-guard validation pipeline.
//!
//! All fallible operations return [`ValidatorError`] through the crate-wide
//! [`Result`] alias. Errors are split along the lines the pipeline cares about:
//! construction problems are [`ValidatorError::Configuration`], sink problems are
//! [`ValidatorError::Accumulation`] / [`ValidatorError::AccumulatorClosed`], and
//! a criterion that misbehaves on a single record reports
//! [`ValidatorError::CriterionEvaluation`], which the chain isolates.

use thiserror::Error;

/// The main error type for the validation pipeline.
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// A criterion failed while evaluating a record or finalizing a stream.
    #[error("Criterion evaluation failed for '{criterion}': {message}")]
    CriterionEvaluation {
        /// Key of the criterion that failed
        criterion: String,
        /// Detailed error message
        message: String,
    },

    /// A criterion or chain could not be built from the supplied parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The accumulator could not store a result.
    #[error("Accumulation failed: {message}")]
    Accumulation {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The accumulator rejected a result because it was already closed.
    #[error("Result accumulator is closed")]
    AccumulatorClosed,

    /// An operation was attempted in the wrong lifecycle phase.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The external sort of a spill file failed.
    #[error("Sort error: {0}")]
    Sort(String),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while parsing YAML configuration.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A context worker panicked or was cancelled.
    #[error("Worker for context '{context}' did not complete: {message}")]
    WorkerJoin { context: String, message: String },

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ValidatorError>`.
pub type Result<T> = std::result::Result<T, ValidatorError>;

impl ValidatorError {
    /// Creates a new criterion evaluation error.
    pub fn criterion_evaluation(criterion: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CriterionEvaluation {
            criterion: criterion.into(),
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new accumulation error.
    pub fn accumulation(message: impl Into<String>) -> Self {
        Self::Accumulation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new accumulation error with a source error.
    pub fn accumulation_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Accumulation {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns true if this error belongs to the accumulation family.
    pub fn is_accumulation(&self) -> bool {
        matches!(
            self,
            ValidatorError::Accumulation { .. } | ValidatorError::AccumulatorClosed
        )
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ValidatorError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| wrap(msg, e.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| wrap(&f(), e.into()))
    }
}

// Configuration errors keep their variant so callers can still tell a fatal
// build problem from an internal one.
fn wrap(msg: &str, err: ValidatorError) -> ValidatorError {
    match err {
        ValidatorError::Configuration(inner) => {
            ValidatorError::Configuration(format!("{msg}: {inner}"))
        }
        ValidatorError::Internal(inner) => ValidatorError::Internal(format!("{msg}: {inner}")),
        other => ValidatorError::Internal(format!("{msg}: {other}")),
    }
}
