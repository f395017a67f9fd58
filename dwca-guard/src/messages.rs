//! Message rendering for validation findings.
//!
//! Criteria never build user-facing text themselves; they ask a
//! [`MessageFormatter`] for a message key plus positional parameters. The
//! default catalogue is English; localized catalogues plug in by implementing
//! the trait.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

pub const COMPLETENESS_INCOMPLETE: &str = "criterion.completeness.incomplete";
pub const NUMERIC_NOT_NUMERIC: &str = "criterion.numeric_range.not_numeric";
pub const NUMERIC_OUT_OF_BOUNDS: &str = "criterion.numeric_range.out_of_bounds";
pub const NUMERIC_SENTINEL: &str = "criterion.numeric_range.sentinel";
pub const UNIQUENESS_DUPLICATE: &str = "criterion.uniqueness.duplicate";
pub const UNIQUENESS_DEGRADED: &str = "criterion.uniqueness.degraded";

static DEFAULT_CATALOGUE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (COMPLETENESS_INCOMPLETE, "{0} is incomplete"),
        (NUMERIC_NOT_NUMERIC, "{0} value '{1}' is not a number"),
        (NUMERIC_OUT_OF_BOUNDS, "{0} value {1} is outside [{2}, {3}]"),
        (
            NUMERIC_SENTINEL,
            "{0}, {1} is probably a default value rather than a real measurement",
        ),
        (UNIQUENESS_DUPLICATE, "Value '{0}' of {1} is not unique"),
        (
            UNIQUENESS_DEGRADED,
            "Uniqueness check on {0} may be incomplete: {1}",
        ),
    ])
});

/// Renders a message key and its parameters into human-readable text.
pub trait MessageFormatter: Debug + Send + Sync {
    fn format(&self, key: &str, params: &[&str]) -> String;
}

/// Shared handle to a formatter, cloned into every criterion.
pub type SharedFormatter = Arc<dyn MessageFormatter>;

/// The built-in English catalogue.
///
/// Unknown keys render as the key followed by the parameters, so a missing
/// translation is visible instead of silently empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMessages;

impl DefaultMessages {
    pub fn shared() -> SharedFormatter {
        Arc::new(DefaultMessages)
    }
}

impl MessageFormatter for DefaultMessages {
    fn format(&self, key: &str, params: &[&str]) -> String {
        match DEFAULT_CATALOGUE.get(key) {
            Some(template) => render(template, params),
            None if params.is_empty() => key.to_string(),
            None => format!("{key} [{}]", params.join(", ")),
        }
    }
}

/// Substitutes `{0}`, `{1}`, ... placeholders. Placeholders without a
/// matching parameter are left as-is.
pub fn render(template: &str, params: &[&str]) -> String {
    let mut out = template.to_string();
    for (index, param) in params.iter().enumerate() {
        out = out.replace(&format!("{{{index}}}"), param);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_positional() {
        assert_eq!(render("{0} and {1}", &["a", "b"]), "a and b");
        assert_eq!(render("{0} and {1}", &["a"]), "a and {1}");
    }

    #[test]
    fn test_default_catalogue() {
        let messages = DefaultMessages;
        assert_eq!(
            messages.format(COMPLETENESS_INCOMPLETE, &["scientificName"]),
            "scientificName is incomplete"
        );
        assert_eq!(
            messages.format(NUMERIC_OUT_OF_BOUNDS, &["decimalLatitude", "91", "-90", "90"]),
            "decimalLatitude value 91 is outside [-90, 90]"
        );
    }

    #[test]
    fn test_unknown_key_is_visible() {
        let messages = DefaultMessages;
        assert_eq!(messages.format("nope", &[]), "nope");
        assert_eq!(messages.format("nope", &["x", "y"]), "nope [x, y]");
    }
}
