//! FASTA helpers shared by the pipeline stages.
//!
//! Sequence records are read and written with `noodles`; the helpers here
//! cover the small amount of header and bookkeeping logic the pipeline needs
//! on top of that (cumulative genome size, identifier charset checks, full
//! header text).

use anyhow::{Context, Result};
use noodles::fasta;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Opens a FASTA reader for the given path (compression auto-detected).
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_reader(path: &Path) -> Result<fasta::io::Reader<Box<dyn BufRead>>> {
    fasta::io::reader::Builder
        .build_from_path(path)
        .with_context(|| format!("Failed to open FASTA: {}", path.display()))
}

/// Returns the record name as UTF-8 text.
///
/// # Errors
/// Returns an error if the name is not valid UTF-8.
pub fn record_name(record: &fasta::Record) -> Result<&str> {
    std::str::from_utf8(record.name()).context("Sequence name is not valid UTF-8")
}

/// Returns the full header text of a record: the name, plus the description
/// when one is present, joined by a single space (the text after `>` in the
/// source file).
///
/// # Errors
/// Returns an error if the header is not valid UTF-8.
pub fn full_header(record: &fasta::Record) -> Result<String> {
    let name = record_name(record)?;
    match record.description() {
        Some(description) => {
            let description =
                std::str::from_utf8(description).context("Sequence description is not valid UTF-8")?;
            Ok(format!("{name} {description}"))
        }
        None => Ok(name.to_string()),
    }
}

/// Computes the cumulative base count of a sequence collection.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed as FASTA.
pub fn genome_size(path: &Path) -> Result<u64> {
    let mut reader = open_reader(path)?;
    let mut cumulative = 0u64;
    for result in reader.records() {
        let record = result?;
        cumulative += record.sequence().len() as u64;
    }
    Ok(cumulative)
}

/// Returns true when every character of an identifier is in the set the
/// downstream alignment toolkit accepts: `[A-Za-z0-9_-]`.
#[must_use]
pub fn identifier_is_clean(header: &str) -> bool {
    header.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Scans the header lines of a FASTA file and reports whether any of them
/// contains a character outside `[A-Za-z0-9_-]` (including the space before a
/// description), in which case the assembly must be normalized before the
/// alignment toolkit can address its sequences by name.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn headers_need_normalizing(path: &Path) -> Result<bool> {
    let file = File::open(path).with_context(|| format!("Failed to open FASTA: {}", path.display()))?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if let Some(header) = line.strip_prefix('>') {
            if !identifier_is_clean(header) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Collects the full header text of every record in a FASTA file, in
/// encounter order.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn header_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open FASTA: {}", path.display()))?;
    let mut headers = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if let Some(header) = line.strip_prefix('>') {
            headers.push(header.trim_end().to_string());
        }
    }
    Ok(headers)
}
