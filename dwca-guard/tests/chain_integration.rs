use std::sync::Arc;

use dwca_guard::accumulator::{InMemoryResultAccumulator, JsonLinesResultAccumulator, ResultAccumulator};
use dwca_guard::core::{
    terms, AggregationValue, EvaluationChain, EvaluationContext, Record, Severity, ValidationType,
};
use dwca_guard::criteria::{
    CompletenessCriterion, FieldCoverageCriterion, NumericRangeCriterion, RecordCountCriterion,
};
use dwca_guard::messages::{self, DefaultMessages, MessageFormatter};

fn occurrence(id: &str, name: &str, lat: &str, lng: &str) -> Record {
    Record::new(id, terms::OCCURRENCE_ROW_TYPE)
        .with_field(terms::SCIENTIFIC_NAME, name)
        .with_field(terms::DECIMAL_LATITUDE, lat)
        .with_field(terms::DECIMAL_LONGITUDE, lng)
}

fn occurrence_chain(acc: Arc<dyn ResultAccumulator>) -> EvaluationChain {
    EvaluationChain::builder(EvaluationContext::Core, acc)
        .record_criterion(
            CompletenessCriterion::builder()
                .not_blank(terms::SCIENTIFIC_NAME)
                .row_type_restriction(terms::OCCURRENCE_ROW_TYPE)
                .build()
                .unwrap(),
        )
        .record_criterion(NumericRangeCriterion::coordinates().build().unwrap())
        .dataset_criterion(RecordCountCriterion::new())
        .dataset_criterion(FieldCoverageCriterion::new(terms::SCIENTIFIC_NAME))
        .build()
        .unwrap()
}

#[test]
fn test_occurrence_stream_end_to_end() {
    let acc = Arc::new(InMemoryResultAccumulator::new());
    let mut chain = occurrence_chain(acc.clone());

    let records = vec![
        occurrence("1", "Puma concolor", "45.5", "-73.6"),
        occurrence("2", "", "0", "0"),
        occurrence("3", "Lynx lynx", "a", "40"),
        occurrence("4", "Lynx rufus", "91", "40"),
    ];
    assert_eq!(chain.process_stream(records).unwrap(), 4);
    let summary = chain.end_of_stream().unwrap();
    assert_eq!(summary.records_processed, 4);
    assert_eq!(summary.criterion_failures, 0);

    let results = acc.validation_results();
    // 4 completeness results (passes included) + 3 coordinate findings
    assert_eq!(results.len(), 7);

    let for_record = |id: &str| -> Vec<_> { results.iter().filter(|r| r.record_id() == id).collect() };

    // record 1 only has its passing completeness result
    let first = for_record("1");
    assert_eq!(first.len(), 1);
    assert!(first[0].is_passed());

    // record 2: incomplete name plus sentinel coordinates, in criterion order
    let second = for_record("2");
    assert_eq!(second.len(), 2);
    assert!(second[0].contains_message(
        &DefaultMessages.format(messages::COMPLETENESS_INCOMPLETE, &[terms::SCIENTIFIC_NAME])
    ));
    assert_eq!(second[1].max_severity(), Some(Severity::Warning));

    assert!(for_record("3")[1].contains_category(ValidationType::RecordContentValue));
    assert!(for_record("4")[1].contains_category(ValidationType::RecordContentBounds));

    assert_eq!(
        acc.aggregation("recordCount", &EvaluationContext::Core)
            .unwrap()
            .value(),
        &AggregationValue::Integer(4)
    );
    assert_eq!(
        acc.aggregation("scientificName.coverage", &EvaluationContext::Core)
            .unwrap()
            .value(),
        &AggregationValue::Ratio(0.75)
    );
}

#[test]
fn test_row_type_mismatch_never_produces_elements() {
    let acc = Arc::new(InMemoryResultAccumulator::new());
    let mut chain = occurrence_chain(acc.clone());

    chain
        .process(&Record::new("t1", terms::TAXON_ROW_TYPE).with_field(terms::SCIENTIFIC_NAME, ""))
        .unwrap();
    chain.end_of_stream().unwrap();

    assert_eq!(acc.validation_result_count(), 0);
    assert_eq!(acc.aggregation_result_count(), 2);
}

#[test]
fn test_results_stream_to_json_lines() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("results.jsonl");
    let acc = Arc::new(JsonLinesResultAccumulator::create(&path).unwrap());
    let mut chain = occurrence_chain(acc.clone());

    chain.process(&occurrence("1", "", "91", "0")).unwrap();
    chain.end_of_stream().unwrap();
    acc.close().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["kind"], "validation");
    assert_eq!(lines[0]["record_id"], "1");
    assert_eq!(lines[3]["kind"], "aggregation");
    assert_eq!(acc.validation_result_count(), 2);

    // closed sinks reject without failing
    assert!(!acc
        .accumulate_validation(dwca_guard::core::ValidationResult::passed(
            "late",
            EvaluationContext::Core,
            terms::OCCURRENCE_ROW_TYPE
        ))
        .unwrap());
}
