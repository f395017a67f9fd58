//! Line-oriented external merge sort, ignoring case.
//!
//! The input is split into chunks of at most `chunk_size` lines. Each chunk
//! is sorted in memory and written to a temporary run file, and the runs are
//! k-way merged into the output. Lines comparing equal keep their input
//! order. An input that fits in one chunk is written directly, without runs.

use crate::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Line terminator written to sorted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    #[default]
    Lf,
    CrLf,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOptions {
    /// Maximum number of lines held in memory at once
    pub chunk_size: usize,
    pub line_terminator: LineTerminator,
    /// Where run files go; the system temp directory when `None`
    pub temp_dir: Option<PathBuf>,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            chunk_size: 100_000,
            line_terminator: LineTerminator::Lf,
            temp_dir: None,
        }
    }
}

impl SortOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_line_terminator(mut self, line_terminator: LineTerminator) -> Self {
        self.line_terminator = line_terminator;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortStats {
    pub lines: u64,
    pub runs: usize,
}

fn sort_key(line: &str) -> String {
    line.to_lowercase()
}

fn read_line(lines: &mut Lines<BufReader<File>>) -> Result<Option<String>> {
    match lines.next() {
        Some(line) => {
            let mut line = line?;
            if line.ends_with('\r') {
                line.pop();
            }
            Ok(Some(line))
        }
        None => Ok(None),
    }
}

fn write_lines<W: Write>(out: &mut W, lines: &[String], terminator: &str) -> Result<()> {
    for line in lines {
        out.write_all(line.as_bytes())?;
        out.write_all(terminator.as_bytes())?;
    }
    Ok(())
}

fn write_run(chunk: &[String], options: &SortOptions) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("dwca-run-").suffix(".txt");
    let run = match &options.temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    let mut out = BufWriter::new(run.reopen()?);
    write_lines(&mut out, chunk, "\n")?;
    out.flush()?;
    Ok(run)
}

/// Sorts the lines of `input` into `output` (created or truncated).
///
/// Trailing `\r` is stripped from input lines, so input written with either
/// terminator sorts the same.
pub fn external_sort(input: &Path, output: &Path, options: &SortOptions) -> Result<SortStats> {
    if options.chunk_size == 0 {
        return Err(ValidatorError::Sort("chunk size must be positive".to_string()));
    }
    let terminator = options.line_terminator.as_str();
    let mut lines = BufReader::new(File::open(input)?).lines();
    let mut stats = SortStats::default();
    let mut runs = Vec::new();

    loop {
        let mut chunk = Vec::with_capacity(options.chunk_size.min(8192));
        while chunk.len() < options.chunk_size {
            match read_line(&mut lines)? {
                Some(line) => chunk.push(line),
                None => break,
            }
        }
        let exhausted = chunk.len() < options.chunk_size;
        stats.lines += chunk.len() as u64;
        chunk.sort_by_cached_key(|line| sort_key(line));

        if runs.is_empty() && exhausted {
            let mut out = BufWriter::new(File::create(output)?);
            write_lines(&mut out, &chunk, terminator)?;
            out.flush()?;
            debug!(lines = stats.lines, "Sorted spill file in memory");
            return Ok(stats);
        }
        if !chunk.is_empty() {
            runs.push(write_run(&chunk, options)?);
        }
        if exhausted {
            break;
        }
    }

    stats.runs = runs.len();
    merge_runs(&runs, output, terminator)?;
    debug!(lines = stats.lines, runs = stats.runs, "Merged sorted runs");
    Ok(stats)
}

fn merge_runs(runs: &[NamedTempFile], output: &Path, terminator: &str) -> Result<()> {
    let mut readers = runs
        .iter()
        .map(|run| Ok(BufReader::new(run.reopen()?).lines()))
        .collect::<Result<Vec<_>>>()?;

    // (key, run index) orders equal keys by run, keeping the sort stable
    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (index, reader) in readers.iter_mut().enumerate() {
        if let Some(line) = read_line(reader)? {
            heap.push(Reverse((sort_key(&line), index, line)));
        }
    }

    let mut out = BufWriter::new(File::create(output)?);
    while let Some(Reverse((_, index, line))) = heap.pop() {
        out.write_all(line.as_bytes())?;
        out.write_all(terminator.as_bytes())?;
        if let Some(next) = read_line(&mut readers[index])? {
            heap.push(Reverse((sort_key(&next), index, next)));
        }
    }
    out.flush()?;
    Ok(())
}
