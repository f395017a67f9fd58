//! Property-based tests for the uniqueness machinery.
//!
//! Duplicate counts are checked against an independent in-memory count for
//! arbitrary value streams and buffer sizes, so every mix of in-buffer and
//! spilled values is covered. The external sort and the spill-line escaping
//! get their own properties.

use std::collections::HashMap;
use std::sync::Arc;

use dwca_guard::accumulator::{InMemoryResultAccumulator, ResultAccumulator};
use dwca_guard::core::{terms, EvaluationChain, EvaluationContext, Record};
use dwca_guard::uniqueness::{
    escape, external_sort, unescape, SortOptions, UniquenessEvaluator, UniquenessSettings,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn expected_duplicates(values: &[String]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.to_lowercase()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(value, n)| (value, n - 1))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_duplicates_reported_once_per_extra_occurrence(
        values in prop::collection::vec("[a-dA-D]{1,2}", 0..60),
        threshold in 1usize..20,
        chunk in 1usize..8,
    ) {
        let dir = TempDir::new().unwrap();
        let acc = Arc::new(InMemoryResultAccumulator::new());
        let evaluator = UniquenessEvaluator::builder()
            .context(EvaluationContext::Core)
            .field(terms::OCCURRENCE_ID)
            .settings(UniquenessSettings {
                buffer_threshold: threshold,
                spill_dir: Some(dir.path().to_path_buf()),
                sort_chunk_size: chunk,
                ..Default::default()
            })
            .build()
            .unwrap();
        let mut chain = EvaluationChain::builder(EvaluationContext::Core, acc.clone())
            .record_criterion(evaluator)
            .build()
            .unwrap();

        let records = values.iter().enumerate().map(|(i, v)| {
            Record::new(format!("r{i}"), terms::OCCURRENCE_ROW_TYPE)
                .with_field(terms::OCCURRENCE_ID, v.as_str())
        });
        chain.process_stream(records).unwrap();
        let summary = chain.end_of_stream().unwrap();
        prop_assert!(!summary.is_degraded());

        let mut reported: HashMap<String, usize> = HashMap::new();
        for result in acc.validation_results() {
            *reported.entry(result.record_id().to_lowercase()).or_default() += 1;
        }
        prop_assert_eq!(reported, expected_duplicates(&values));
        prop_assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn prop_external_sort_is_a_stable_case_insensitive_sort(
        lines in prop::collection::vec("[a-zA-Z0-9]{1,6}", 0..80),
        chunk in 1usize..16,
    ) {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        let mut content = String::new();
        for line in &lines {
            content.push_str(line);
            content.push('\n');
        }
        std::fs::write(&input, content).unwrap();

        let options = SortOptions::default()
            .with_chunk_size(chunk)
            .with_temp_dir(dir.path());
        let stats = external_sort(&input, &output, &options).unwrap();
        prop_assert_eq!(stats.lines as usize, lines.len());

        let mut expected = lines.clone();
        expected.sort_by_key(|l| l.to_lowercase());
        let sorted = std::fs::read_to_string(&output).unwrap();
        let actual: Vec<&str> = sorted.lines().collect();
        prop_assert_eq!(actual, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn prop_escaped_values_fit_on_one_line(value in "[a-z\\\\\\n\\r ]{0,12}") {
        let escaped = escape(&value);
        prop_assert!(!escaped.contains('\n'));
        prop_assert!(!escaped.contains('\r'));
        prop_assert_eq!(unescape(&escaped), value);
    }
}
