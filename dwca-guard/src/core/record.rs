//! The record type consumed by the pipeline.

use serde::{Deserialize, Serialize};

/// Well-known Darwin Core term and row type identifiers.
pub mod terms {
    pub const OCCURRENCE_ID: &str = "occurrenceID";
    pub const SCIENTIFIC_NAME: &str = "scientificName";
    pub const BASIS_OF_RECORD: &str = "basisOfRecord";
    pub const DECIMAL_LATITUDE: &str = "decimalLatitude";
    pub const DECIMAL_LONGITUDE: &str = "decimalLongitude";
    pub const COUNTRY_CODE: &str = "countryCode";
    pub const EVENT_DATE: &str = "eventDate";

    pub const OCCURRENCE_ROW_TYPE: &str = "http://rs.tdwg.org/dwc/terms/Occurrence";
    pub const TAXON_ROW_TYPE: &str = "http://rs.tdwg.org/dwc/terms/Taxon";
    pub const MULTIMEDIA_ROW_TYPE: &str = "http://rs.gbif.org/terms/1.0/Multimedia";
}

/// One row of a core or extension file.
///
/// Field order is preserved as produced by the stream source. Lookups are
/// linear; archives rarely exceed a few dozen columns per row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    row_type: String,
    fields: Vec<(String, String)>,
}

impl Record {
    /// Creates an empty record.
    pub fn new(id: impl Into<String>, row_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            row_type: row_type.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field value, replacing any earlier value for the same field.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
        self
    }

    /// The record identifier (core id, or the shared id for extension rows).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn row_type(&self) -> &str {
        &self.row_type
    }

    /// Returns the raw value of a field, `None` if the field is absent.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of a field only if it contains non-whitespace text.
    pub fn non_blank_value(&self, field: &str) -> Option<&str> {
        self.value(field).filter(|value| !value.trim().is_empty())
    }

    /// Iterates over fields in stream order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_and_replacement() {
        let record = Record::new("1", terms::OCCURRENCE_ROW_TYPE)
            .with_field("b", "x")
            .with_field("a", "y")
            .with_field("b", "z");

        let fields: Vec<_> = record.fields().collect();
        assert_eq!(fields, vec![("b", "z"), ("a", "y")]);
    }

    #[test]
    fn test_non_blank_value() {
        let record = Record::new("1", "rt")
            .with_field("empty", "   ")
            .with_field("full", "Puma concolor");

        assert_eq!(record.value("empty"), Some("   "));
        assert_eq!(record.non_blank_value("empty"), None);
        assert_eq!(record.non_blank_value("full"), Some("Puma concolor"));
        assert_eq!(record.value("missing"), None);
    }
}
