//! Severity of a validation finding.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity attached to every [`ValidationResultElement`](super::ValidationResultElement).
///
/// Severities are ordered: `Error > Warning > Ok`.
///
/// - **Error**: the record violates a rule and should be reported.
/// - **Warning**: the record looks suspicious (e.g. coordinates at 0/0).
/// - **Ok**: the check passed but the caller asked for passes to be recorded.
///
/// ```rust
/// use dwca_guard::core::Severity;
///
/// assert!(Severity::Error > Severity::Warning);
/// assert!(Severity::Warning.is_at_least(Severity::Ok));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok = 0,
    Warning = 1,
    #[default]
    Error = 2,
}

impl Severity {
    /// Returns the string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Checks if this severity is at least as severe as another.
    pub fn is_at_least(&self, other: Severity) -> bool {
        *self >= other
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
