//! Runs the chains of every evaluation context of an archive concurrently.

use crate::core::{ChainSummary, EvaluationChain, EvaluationContext, Record};
use crate::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// Outcome of one [`ArchiveValidator::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One summary per context, in the order the streams were given
    pub summaries: Vec<ChainSummary>,
    pub validation_results: usize,
    pub aggregation_results: usize,
}

impl RunReport {
    pub fn records_processed(&self) -> u64 {
        self.summaries.iter().map(|s| s.records_processed).sum()
    }

    pub fn criterion_failures(&self) -> u64 {
        self.summaries.iter().map(|s| s.criterion_failures).sum()
    }

    /// Contexts where at least one check could not run to completion.
    pub fn degraded_contexts(&self) -> Vec<&EvaluationContext> {
        self.summaries
            .iter()
            .filter(|s| s.is_degraded())
            .map(|s| &s.context)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.summaries.iter().any(ChainSummary::is_degraded)
    }

    pub fn summary(&self, context: &EvaluationContext) -> Option<&ChainSummary> {
        self.summaries.iter().find(|s| &s.context == context)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives one [`EvaluationChain`] per context, each on its own blocking
/// worker, against the accumulator the chains were built with.
///
/// ```rust
/// use std::sync::Arc;
/// use dwca_guard::accumulator::{InMemoryResultAccumulator, ResultAccumulator};
/// use dwca_guard::core::{EvaluationChain, EvaluationContext, Record};
/// use dwca_guard::criteria::RecordCountCriterion;
/// use dwca_guard::runner::ArchiveValidator;
///
/// # #[tokio::main]
/// # async fn main() -> dwca_guard::prelude::Result<()> {
/// let acc = Arc::new(InMemoryResultAccumulator::new());
/// let core = EvaluationChain::builder(EvaluationContext::Core, acc.clone())
///     .dataset_criterion(RecordCountCriterion::new())
///     .build()?;
/// let records = vec![Record::new("1", "Occurrence"), Record::new("2", "Occurrence")];
///
/// let report = ArchiveValidator::new(acc.clone()).run(vec![(core, records)]).await?;
/// assert_eq!(report.records_processed(), 2);
/// assert_eq!(report.aggregation_results, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveValidator {
    accumulator: SharedAccumulator,
}

impl ArchiveValidator {
    pub fn new(accumulator: SharedAccumulator) -> Self {
        Self { accumulator }
    }

    pub fn accumulator(&self) -> &SharedAccumulator {
        &self.accumulator
    }

    /// Processes every stream through its chain, then signals end of stream.
    ///
    /// All workers are awaited even when one fails; the first error, in
    /// stream order, is returned afterwards.
    #[instrument(skip_all, fields(contexts = streams.len()))]
    pub async fn run<I>(&self, streams: Vec<(EvaluationChain, I)>) -> Result<RunReport>
    where
        I: IntoIterator<Item = Record> + Send + 'static,
    {
        let started_at = Utc::now();

        let handles: Vec<(EvaluationContext, JoinHandle<Result<ChainSummary>>)> = streams
            .into_iter()
            .map(|(chain, records)| {
                let context = chain.context().clone();
                let handle = tokio::task::spawn_blocking(move || run_chain(chain, records));
                (context, handle)
            })
            .collect();

        let mut summaries = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for (context, handle) in handles {
            let outcome = handle.await.map_err(|e| ValidatorError::WorkerJoin {
                context: context.to_string(),
                message: e.to_string(),
            });
            match outcome.and_then(|summary| summary) {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(context = %context, error = %e, "Context evaluation failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            summaries,
            validation_results: self.accumulator.validation_result_count(),
            aggregation_results: self.accumulator.aggregation_result_count(),
        };
        info!(
            records = report.records_processed(),
            validation_results = report.validation_results,
            aggregation_results = report.aggregation_results,
            degraded = report.is_degraded(),
            "Archive validation finished"
        );
        Ok(report)
    }

    /// Same as [`run`](Self::run) but one context after the other on the
    /// calling thread.
    pub fn run_sequential<I>(&self, streams: Vec<(EvaluationChain, I)>) -> Result<RunReport>
    where
        I: IntoIterator<Item = Record>,
    {
        let started_at = Utc::now();
        let summaries = streams
            .into_iter()
            .map(|(chain, records)| run_chain(chain, records))
            .collect::<Result<Vec<_>>>()?;
        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            summaries,
            validation_results: self.accumulator.validation_result_count(),
            aggregation_results: self.accumulator.aggregation_result_count(),
        })
    }
}

fn run_chain<I>(mut chain: EvaluationChain, records: I) -> Result<ChainSummary>
where
    I: IntoIterator<Item = Record>,
{
    chain.process_stream(records)?;
    chain.end_of_stream()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::{InMemoryResultAccumulator, ResultAccumulator};
    use crate::core::RecordCriterion;
    use crate::criteria::{CompletenessCriterion, RecordCountCriterion};
    use std::sync::Arc;

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let name = if i % 2 == 0 { "x" } else { "" };
                Record::new(i.to_string(), "rt").with_field("name", name)
            })
            .collect()
    }

    fn chain(context: EvaluationContext, acc: SharedAccumulator) -> EvaluationChain {
        EvaluationChain::builder(context, acc)
            .record_criterion(
                CompletenessCriterion::builder()
                    .not_blank("name")
                    .build()
                    .unwrap(),
            )
            .dataset_criterion(RecordCountCriterion::new())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_reports_every_context() {
        let acc = Arc::new(InMemoryResultAccumulator::new());
        let streams = vec![
            (chain(EvaluationContext::Core, acc.clone()), records(10)),
            (chain(EvaluationContext::extension("a"), acc.clone()), records(4)),
        ];

        let report = ArchiveValidator::new(acc.clone()).run(streams).await.unwrap();
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.records_processed(), 14);
        assert_eq!(report.validation_results, 14);
        assert_eq!(report.aggregation_results, 2);
        assert!(report.degraded_contexts().is_empty());
        assert!(report.finished_at >= report.started_at);
        assert_eq!(
            report.summary(&EvaluationContext::extension("a")).unwrap().records_processed,
            4
        );
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_join_error() {
        #[derive(Debug)]
        struct Panics;
        impl RecordCriterion for Panics {
            fn key(&self) -> &str {
                "panics"
            }
            fn validate(
                &mut self,
                _record: &Record,
                _context: &EvaluationContext,
            ) -> Result<Option<crate::core::ValidationResult>> {
                panic!("criterion bug")
            }
        }

        let acc = Arc::new(InMemoryResultAccumulator::new());
        let broken = EvaluationChain::builder(EvaluationContext::Core, acc.clone())
            .record_criterion(Panics)
            .build()
            .unwrap();
        let healthy = chain(EvaluationContext::extension("ok"), acc.clone());

        let err = ArchiveValidator::new(acc.clone())
            .run(vec![(broken, records(1)), (healthy, records(3))])
            .await
            .unwrap_err();
        assert!(matches!(err, ValidatorError::WorkerJoin { ref context, .. } if context == "core"));
        // the healthy context still ran to completion
        assert_eq!(acc.aggregation_result_count(), 1);
    }

    #[tokio::test]
    async fn test_core_and_extension_streams() {
        use crate::core::terms;
        use crate::criteria::{FieldCoverageCriterion, NumericRangeCriterion};
        use crate::test_fixtures::{mixed_occurrences, multimedia};

        let acc = Arc::new(InMemoryResultAccumulator::new());
        let core = EvaluationChain::builder(EvaluationContext::Core, acc.clone())
            .record_criterion(NumericRangeCriterion::coordinates().build().unwrap())
            .build()
            .unwrap();
        let media_context = EvaluationContext::extension(terms::MULTIMEDIA_ROW_TYPE);
        let media = EvaluationChain::builder(media_context.clone(), acc.clone())
            .dataset_criterion(FieldCoverageCriterion::new("identifier"))
            .build()
            .unwrap();
        let media_records = vec![multimedia("occ-1", "a.jpg"), multimedia("occ-2", "")];

        let report = ArchiveValidator::new(acc.clone())
            .run(vec![(core, mixed_occurrences(20)), (media, media_records)])
            .await
            .unwrap();

        // every fifth occurrence sits at 0/0
        assert_eq!(acc.validation_results_for(&EvaluationContext::Core).len(), 4);
        assert_eq!(report.summary(&media_context).unwrap().records_processed, 2);
        let coverage = acc.aggregation("identifier.coverage", &media_context).unwrap();
        assert_eq!(coverage.value(), &crate::core::AggregationValue::Ratio(0.5));
    }

    #[test]
    fn test_run_sequential() {
        let acc = Arc::new(InMemoryResultAccumulator::new());
        let report = ArchiveValidator::new(acc.clone())
            .run_sequential(vec![(chain(EvaluationContext::Core, acc.clone()), records(3))])
            .unwrap();
        assert_eq!(report.records_processed(), 3);
        assert_eq!(acc.validation_result_count(), 3);
    }
}
