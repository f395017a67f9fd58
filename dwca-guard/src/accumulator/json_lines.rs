//! Accumulator that streams results as JSON lines.

use super::ResultAccumulator;
use crate::core::{AggregationResult, ValidationResult};
use crate::prelude::*;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Validation(&'a ValidationResult),
    Aggregation(&'a AggregationResult),
}

/// Encodes one result line. A failure belongs to the accumulation family so
/// callers treat it like any other sink failure.
fn encode<T: Serialize>(item: &T) -> Result<String> {
    serde_json::to_string(item).map_err(|e| {
        error!(error = %e, "Failed to encode result line");
        ValidatorError::accumulation_with_source("cannot encode result line", Box::new(e))
    })
}

struct Sink<W: Write> {
    writer: Option<BufWriter<W>>,
    validation_count: usize,
    aggregation_count: usize,
}

/// Writes every accepted result as one JSON object per line.
///
/// Nothing is kept in memory besides the write buffer, so this is the sink to
/// use when an archive produces millions of findings. A failed write is an
/// unrecoverable [`ValidatorError::Accumulation`]; the failed result is not
/// counted.
pub struct JsonLinesResultAccumulator<W: Write + Send = File> {
    sink: Mutex<Sink<W>>,
}

impl JsonLinesResultAccumulator<File> {
    /// Creates (or truncates) the output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            ValidatorError::accumulation_with_source(
                format!("cannot create result file '{}'", path.display()),
                Box::new(e),
            )
        })?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> JsonLinesResultAccumulator<W> {
    pub fn new(writer: W) -> Self {
        Self {
            sink: Mutex::new(Sink {
                writer: Some(BufWriter::new(writer)),
                validation_count: 0,
                aggregation_count: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sink<W>> {
        self.sink
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes one line; returns `Ok(false)` if the sink is closed.
    fn write_line(sink: &mut Sink<W>, line: &Line<'_>) -> Result<bool> {
        let Some(writer) = sink.writer.as_mut() else {
            return Ok(false);
        };
        let encoded = encode(line)?;
        writer
            .write_all(encoded.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| {
                error!(error = %e, "Failed to write result line");
                ValidatorError::accumulation_with_source("cannot write result line", Box::new(e))
            })?;
        Ok(true)
    }
}

impl<W: Write + Send> fmt::Debug for JsonLinesResultAccumulator<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = self.lock();
        f.debug_struct("JsonLinesResultAccumulator")
            .field("closed", &sink.writer.is_none())
            .field("validation_count", &sink.validation_count)
            .field("aggregation_count", &sink.aggregation_count)
            .finish()
    }
}

impl<W: Write + Send> ResultAccumulator for JsonLinesResultAccumulator<W> {
    fn accumulate_validation(&self, result: ValidationResult) -> Result<bool> {
        let mut sink = self.lock();
        let written = Self::write_line(&mut sink, &Line::Validation(&result))?;
        if written {
            sink.validation_count += 1;
        }
        Ok(written)
    }

    fn accumulate_aggregation(&self, result: AggregationResult) -> Result<bool> {
        let mut sink = self.lock();
        let written = Self::write_line(&mut sink, &Line::Aggregation(&result))?;
        if written {
            sink.aggregation_count += 1;
        }
        Ok(written)
    }

    fn validation_result_count(&self) -> usize {
        self.lock().validation_count
    }

    fn aggregation_result_count(&self) -> usize {
        self.lock().aggregation_count
    }

    fn close(&self) -> Result<()> {
        let mut sink = self.lock();
        if let Some(mut writer) = sink.writer.take() {
            writer.flush().map_err(|e| {
                ValidatorError::accumulation_with_source("cannot flush result file", Box::new(e))
            })?;
            debug!(
                accumulator.validation = sink.validation_count,
                accumulator.aggregation = sink.aggregation_count,
                "JSON lines accumulator closed"
            );
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().writer.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EvaluationContext;
    use std::io;

    #[test]
    fn test_lines_are_tagged_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let acc = JsonLinesResultAccumulator::create(&path).unwrap();

        acc.accumulate_validation(ValidationResult::passed(
            "occ-1",
            EvaluationContext::Core,
            "rt",
        ))
        .unwrap();
        acc.accumulate_aggregation(AggregationResult::new(
            "recordCount",
            1i64.into(),
            EvaluationContext::Core,
        ))
        .unwrap();
        acc.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "validation");
        assert_eq!(lines[0]["record_id"], "occ-1");
        assert_eq!(lines[1]["kind"], "aggregation");
        assert_eq!(lines[1]["value"], 1);
    }

    #[test]
    fn test_closed_sink_rejects() {
        let acc = JsonLinesResultAccumulator::new(Vec::new());
        acc.close().unwrap();
        let accepted = acc
            .accumulate_validation(ValidationResult::passed("1", EvaluationContext::Core, "rt"))
            .unwrap();
        assert!(!accepted);
        assert_eq!(acc.validation_result_count(), 0);
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            Err(serde::ser::Error::custom("unsupported value"))
        }
    }

    #[test]
    fn test_encoding_failure_is_accumulation_error() {
        let err = encode(&Unencodable).unwrap_err();
        assert!(err.is_accumulation());
        assert!(matches!(err, ValidatorError::Accumulation { source: Some(_), .. }));
    }

    #[test]
    fn test_io_failure_is_accumulation_error() {
        let acc = JsonLinesResultAccumulator::new(FailingWriter);
        // BufWriter absorbs small writes; the failure surfaces on flush.
        acc.accumulate_validation(ValidationResult::passed("1", EvaluationContext::Core, "rt"))
            .unwrap();
        let err = acc.close().unwrap_err();
        assert!(err.is_accumulation());
    }
}
