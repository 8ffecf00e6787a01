//! Reassembly of per-partition outputs into the unified results.
//!
//! Per-partition polished sequences and change logs are concatenated in
//! ascending partition-ordinal order, which makes re-runs of the same
//! partitioning byte-identical regardless of job completion order. A missing
//! partition file is skipped silently (a partition can legitimately be empty
//! when more partitions than sequences were requested).
//!
//! When the run normalized identifiers, the unified outputs are rewritten
//! back to the original headers through the correspondence table; a record or
//! change-log line whose identifier cannot be resolved is dropped with a
//! warning, not a crash, and the drops are reported in aggregate.

use crate::fasta;
use crate::logging::OperationTimer;
use crate::naming::{strip_polished_suffix, CorrespondenceTable};
use crate::partition;
use anyhow::{Context, Result};
use log::{info, warn};
use noodles::fasta as noodles_fasta;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Aggregate counts of entries dropped during identifier restoration.
#[derive(Debug, Default)]
pub struct RemapReport {
    /// Polished records whose identifier had no correspondence entry.
    pub dropped_records: usize,
    /// Change-log lines whose identifier had no correspondence entry.
    pub dropped_changes: usize,
}

impl RemapReport {
    /// Logs the aggregate drop counts, if any.
    pub fn log_summary(&self) {
        if self.dropped_records > 0 {
            warn!(
                "{} polished record(s) had no correspondence entry and were dropped",
                self.dropped_records
            );
        }
        if self.dropped_changes > 0 {
            warn!(
                "{} change-log line(s) had no correspondence entry and were dropped",
                self.dropped_changes
            );
        }
    }
}

fn append_file(out: &mut impl Write, path: &Path) -> Result<()> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    io::copy(&mut file, out)?;
    // separator guards against a contribution not ending in a newline
    out.write_all(b"\n")?;
    Ok(())
}

/// Concatenates per-partition polished outputs and change logs, ordinals
/// `1..=count` ascending, into the unified `.tmp` outputs.
///
/// # Errors
/// Returns an error if an existing partition file cannot be read or the
/// outputs cannot be written.
pub fn merge_partition_outputs(
    polished_dir: &Path,
    count: usize,
    out_fasta: &Path,
    out_changes: &Path,
) -> Result<()> {
    let timer = OperationTimer::new("Merging results");

    let mut fasta_out = BufWriter::new(
        File::create(out_fasta)
            .with_context(|| format!("Failed to create {}", out_fasta.display()))?,
    );
    let mut changes_out = BufWriter::new(
        File::create(out_changes)
            .with_context(|| format!("Failed to create {}", out_changes.display()))?,
    );

    for ordinal in 1..=count {
        let polished = polished_dir.join(partition::polished_fasta_name(ordinal));
        if polished.exists() {
            append_file(&mut fasta_out, &polished)?;
        }
        let changes = polished_dir.join(partition::changes_name(ordinal));
        if changes.exists() {
            append_file(&mut changes_out, &changes)?;
        }
    }
    fasta_out.flush()?;
    changes_out.flush()?;

    timer.done();
    Ok(())
}

/// Rewrites the unified polished output and change log back to original
/// identifiers through the correspondence table.
///
/// The polishing engine appends a `_polished` marker to every identifier; it
/// is stripped before lookup. Records and change-log lines that cannot be
/// resolved are dropped (warned, counted), never fatal; only a table that
/// cannot be loaded at all aborts the run, and that is the caller's concern.
///
/// # Errors
/// Returns an error if the inputs cannot be read or the outputs written.
pub fn restore_identifiers(
    tmp_fasta: &Path,
    tmp_changes: &Path,
    table: &CorrespondenceTable,
    out_fasta: &Path,
    out_changes: &Path,
) -> Result<RemapReport> {
    let timer = OperationTimer::new("Restoring original sequence names");
    let mut report = RemapReport::default();

    let reader = BufReader::new(
        File::open(tmp_fasta).with_context(|| format!("Failed to open {}", tmp_fasta.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(out_fasta)
            .with_context(|| format!("Failed to create {}", out_fasta.display()))?,
    );
    let mut keep = false;
    for line in reader.lines() {
        let line = line?;
        if let Some(header) = line.strip_prefix('>') {
            let id = header.split_whitespace().next().unwrap_or("");
            match table.resolve(strip_polished_suffix(id)) {
                Some(original) => {
                    keep = true;
                    writeln!(writer, ">{original}")?;
                }
                None => {
                    keep = false;
                    report.dropped_records += 1;
                    warn!("No correspondence entry for polished record '{id}', dropping it");
                }
            }
        } else if line.is_empty() {
            // partition separators from the merge
            continue;
        } else if keep {
            writeln!(writer, "{line}")?;
        }
    }
    writer.flush()?;

    let reader = BufReader::new(
        File::open(tmp_changes)
            .with_context(|| format!("Failed to open {}", tmp_changes.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(out_changes)
            .with_context(|| format!("Failed to create {}", out_changes.display()))?,
    );
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match line.split_once('\t') {
            Some((id, rest)) => match table.resolve(strip_polished_suffix(id)) {
                Some(original) => writeln!(writer, "{original}\t{rest}")?,
                None => report.dropped_changes += 1,
            },
            None => report.dropped_changes += 1,
        }
    }
    writer.flush()?;

    timer.done();
    Ok(report)
}

/// Appends every input sequence absent from the polished output, unmodified.
///
/// A sequence with no usable alignment coverage produces no polished record;
/// with backfill enabled the final output's identifier set equals the
/// input's. Returns the number of sequences appended.
///
/// # Errors
/// Returns an error if the genome or output cannot be read/written.
pub fn append_unpolished(genome: &Path, final_fasta: &Path) -> Result<usize> {
    let timer = OperationTimer::new("Writing unpolished sequences to final output");

    let polished: HashSet<String> = fasta::header_lines(final_fasta)?
        .into_iter()
        .map(|header| strip_polished_suffix(&header).to_string())
        .collect();

    let out = OpenOptions::new()
        .append(true)
        .open(final_fasta)
        .with_context(|| format!("Failed to open {}", final_fasta.display()))?;
    let mut writer = noodles_fasta::io::Writer::new(BufWriter::new(out));

    let mut appended = 0;
    let mut reader = fasta::open_reader(genome)?;
    for result in reader.records() {
        let record = result?;
        let header = fasta::full_header(&record)?;
        if !polished.contains(strip_polished_suffix(&header)) {
            writer.write_record(&record)?;
            appended += 1;
        }
    }
    writer.get_mut().flush()?;

    if appended > 0 {
        info!("Appended {appended} unpolished sequence(s)");
    }
    timer.done();
    Ok(appended)
}
