//! Destinations for batches produced by the pairwise sweep.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::cohort::{AdmissionId, PairResult};
use crate::io::tsv_writer::{PairLayout, write_pair_row};

pub trait SimilaritySink {
    /// Called once per finished batch, in batch order.
    fn write_batch(&mut self, batch: usize, records: &[PairResult]) -> Result<()>;
}

/// Keeps every batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub batches: Vec<(usize, Vec<PairResult>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> impl Iterator<Item = &PairResult> {
        self.batches.iter().flat_map(|(_, records)| records.iter())
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(|(_, r)| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SimilaritySink for MemorySink {
    fn write_batch(&mut self, batch: usize, records: &[PairResult]) -> Result<()> {
        self.batches.push((batch, records.to_vec()));
        Ok(())
    }
}

/// Appends each batch to a pair TSV and flushes it, so a crash loses at most
/// the batch in flight.
pub struct TsvPairSink {
    path: PathBuf,
    writer: BufWriter<File>,
    layout: PairLayout,
    rows: usize,
}

impl TsvPairSink {
    /// Truncate `path` and write the header.
    pub fn create(path: &Path, layout: PairLayout) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", layout.header())?;
        writer.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            layout,
            rows: 0,
        })
    }

    /// Continue an interrupted table; starts a new one if `path` is missing or
    /// empty.
    ///
    /// Only rows whose anchor (`encounter_a`) satisfies `completed` survive, each
    /// pair at most once, so re-running the batches after the last finished one
    /// never duplicates a pair.
    pub fn resume(
        path: &Path,
        layout: PairLayout,
        completed: impl Fn(AdmissionId) -> bool,
    ) -> Result<Self> {
        let has_content = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if !has_content {
            return Self::create(path, layout);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut lines = content.lines();
        let header = layout.header();
        if lines.next() != Some(header.as_str()) {
            bail!(
                "{} does not start with the expected header '{}'",
                path.display(),
                header
            );
        }
        let n_cols = header.split('\t').count();

        let mut seen: HashSet<(AdmissionId, AdmissionId)> = HashSet::new();
        let mut kept: Vec<&str> = Vec::new();
        let mut discarded = 0usize;
        for line in lines {
            match parse_pair_key(line, n_cols) {
                Some((a, b)) if completed(a) && seen.insert((a, b)) => kept.push(line),
                _ => discarded += 1,
            }
        }

        let mut sink = Self::create(path, layout)?;
        for line in &kept {
            writeln!(sink.writer, "{}", line)?;
        }
        sink.writer
            .flush()
            .with_context(|| format!("failed to flush {}", path.display()))?;
        info!(
            path = %path.display(),
            kept = kept.len(),
            discarded,
            "pair_table_resumed"
        );
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written by this sink instance.
    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl SimilaritySink for TsvPairSink {
    fn write_batch(&mut self, batch: usize, records: &[PairResult]) -> Result<()> {
        if let Some(bad) = records
            .iter()
            .find(|r| PairLayout::of(&r.similarity) != self.layout)
        {
            bail!(
                "batch {}: pair ({}, {}) does not match the {:?} table layout",
                batch,
                bad.encounter_a,
                bad.encounter_b,
                self.layout
            );
        }
        for record in records {
            write_pair_row(&mut self.writer, record, self.layout)?;
        }
        self.writer
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        self.rows += records.len();
        Ok(())
    }
}

/// `(encounter_a, encounter_b)` of a complete row; `None` for torn or malformed lines.
fn parse_pair_key(line: &str, n_cols: usize) -> Option<(AdmissionId, AdmissionId)> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != n_cols {
        return None;
    }
    if fields[2..].iter().any(|f| f.parse::<f64>().is_err()) {
        return None;
    }
    Some((fields[0].parse().ok()?, fields[1].parse().ok()?))
}
