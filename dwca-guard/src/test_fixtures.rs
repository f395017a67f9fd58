//! Record builders for common archive shapes.
//!
//! Occurrence, taxon and multimedia records with the fields the built-in
//! criteria look at, plus helpers producing whole streams with known
//! duplicates and coordinate problems.

use crate::core::{terms, Record};

/// An occurrence with a name, basis of record and coordinates.
pub fn occurrence(id: &str, name: &str, lat: &str, lng: &str) -> Record {
    Record::new(id, terms::OCCURRENCE_ROW_TYPE)
        .with_field(terms::OCCURRENCE_ID, id)
        .with_field(terms::SCIENTIFIC_NAME, name)
        .with_field(terms::BASIS_OF_RECORD, "HumanObservation")
        .with_field(terms::DECIMAL_LATITUDE, lat)
        .with_field(terms::DECIMAL_LONGITUDE, lng)
}

/// A valid occurrence whose `occurrenceID` is `occurrence_id`, independent of
/// the record id.
pub fn occurrence_with_id(record_id: &str, occurrence_id: &str) -> Record {
    occurrence(record_id, "Puma concolor", "45.5", "-73.6")
        .with_field(terms::OCCURRENCE_ID, occurrence_id)
}

pub fn taxon(id: &str, name: &str) -> Record {
    Record::new(id, terms::TAXON_ROW_TYPE).with_field(terms::SCIENTIFIC_NAME, name)
}

/// Multimedia extension row linked to core record `core_id`.
pub fn multimedia(core_id: &str, identifier: &str) -> Record {
    Record::new(core_id, terms::MULTIMEDIA_ROW_TYPE).with_field("identifier", identifier)
}

/// One occurrence per value, with `occurrenceID` set to the value.
pub fn occurrences_with_ids<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<Record> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| occurrence_with_id(&format!("rec-{i}"), value))
        .collect()
}

/// `n` occurrences where every third lacks a scientific name and every fifth
/// sits at 0/0.
pub fn mixed_occurrences(n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let name = if i % 3 == 0 { "" } else { "Puma concolor" };
            let (lat, lng) = if i % 5 == 0 { ("0", "0") } else { ("12.5", "-70.1") };
            occurrence(&format!("occ-{i}"), name, lat, lng)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurrences_with_ids() {
        let records = occurrences_with_ids(["a", "b"]);
        assert_eq!(records[1].id(), "rec-1");
        assert_eq!(records[1].value(terms::OCCURRENCE_ID), Some("b"));
    }

    #[test]
    fn test_mixed_occurrences_shape() {
        let records = mixed_occurrences(15);
        let unnamed = records
            .iter()
            .filter(|r| r.non_blank_value(terms::SCIENTIFIC_NAME).is_none())
            .count();
        assert_eq!(unnamed, 5);
    }
}
