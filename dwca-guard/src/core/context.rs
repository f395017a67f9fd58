//! Evaluation context: which stream of the archive a record belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies the stream a record or result originates from.
///
/// An archive has exactly one core stream and any number of extension
/// streams, each identified by its row type. Every result carries its
/// context so findings can be traced back to the right physical file.
///
/// ```rust
/// use dwca_guard::core::EvaluationContext;
///
/// let ctx = EvaluationContext::extension("http://rs.gbif.org/terms/1.0/Multimedia");
/// assert!(!ctx.is_core());
/// assert_eq!(ctx.row_type(), Some("http://rs.gbif.org/terms/1.0/Multimedia"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationContext {
    #[default]
    Core,
    Extension(String),
}

impl EvaluationContext {
    /// Creates an extension context for the given row type.
    pub fn extension(row_type: impl Into<String>) -> Self {
        EvaluationContext::Extension(row_type.into())
    }

    pub fn is_core(&self) -> bool {
        matches!(self, EvaluationContext::Core)
    }

    /// Returns the extension row type, `None` for the core stream.
    pub fn row_type(&self) -> Option<&str> {
        match self {
            EvaluationContext::Core => None,
            EvaluationContext::Extension(row_type) => Some(row_type),
        }
    }
}

impl fmt::Display for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationContext::Core => write!(f, "core"),
            EvaluationContext::Extension(row_type) => write!(f, "extension({row_type})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(EvaluationContext::Core.to_string(), "core");
        assert_eq!(
            EvaluationContext::extension("Multimedia").to_string(),
            "extension(Multimedia)"
        );
    }

    #[test]
    fn test_serde_shape() {
        assert_eq!(
            serde_json::to_string(&EvaluationContext::Core).unwrap(),
            "\"core\""
        );
        assert_eq!(
            serde_json::to_string(&EvaluationContext::extension("Identification")).unwrap(),
            "{\"extension\":\"Identification\"}"
        );
    }
}
