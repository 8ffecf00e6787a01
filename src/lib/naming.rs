//! Sequence identifier normalization and the correspondence table.
//!
//! The alignment toolkit only addresses reference sequences whose names are
//! restricted to `[A-Za-z0-9_-]`. When an input assembly violates that, every
//! header is rewritten to `Contig<i>` in encounter order and the mapping back
//! to the original header is persisted as a two-column TSV. The table is
//! loaded once per run and passed read-only to the stages that need it
//! (identifier restore, cleanup).

use crate::fasta;
use anyhow::{Context, Result};
use log::info;
use noodles::fasta as noodles_fasta;
use noodles_fasta::record::{Definition, Record, Sequence};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Suffix the polishing engine appends to every sequence identifier it emits.
pub const POLISHED_SUFFIX: &str = "_polished";

/// Strips the polishing engine's identifier suffix, if present.
#[must_use]
pub fn strip_polished_suffix(id: &str) -> &str {
    id.strip_suffix(POLISHED_SUFFIX).unwrap_or(id)
}

/// Mapping from normalized identifiers back to original headers.
///
/// Entries are kept in encounter order so the persisted table is
/// deterministic; lookups go through a hash index.
#[derive(Debug, Default)]
pub struct CorrespondenceTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, String>,
}

impl CorrespondenceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a (normalized, original) pair.
    pub fn insert(&mut self, normalized: String, original: String) {
        self.index.insert(normalized.clone(), original.clone());
        self.entries.push((normalized, original));
    }

    /// Resolves a normalized identifier back to its original header.
    #[must_use]
    pub fn resolve(&self, normalized: &str) -> Option<&str> {
        self.index.get(normalized).map(String::as_str)
    }

    /// Iterates over the original headers in encounter order.
    pub fn original_headers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, original)| original.as_str())
    }

    /// Writes the table as a two-column TSV (normalized, original).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create correspondence table: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for (normalized, original) in &self.entries {
            writeln!(writer, "{normalized}\t{original}")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Loads a persisted table.
    ///
    /// A table that cannot be read is fatal: without it the merged output
    /// cannot be mapped back to the input identifiers.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is not
    /// two-column TSV.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to load correspondence table: {}", path.display()))?;
        let mut table = Self::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (normalized, original) = line.split_once('\t').with_context(|| {
                format!("Malformed correspondence table line {}: '{line}'", number + 1)
            })?;
            table.insert(normalized.to_string(), original.to_string());
        }
        Ok(table)
    }
}

/// Rewrites every header of `genome` to `Contig<i>` (encounter order) into
/// `out_fasta`, persisting the normalized → original mapping at `table_path`.
///
/// # Errors
/// Returns an error if the genome cannot be read or the outputs cannot be
/// written.
pub fn normalize_assembly(
    genome: &Path,
    out_fasta: &Path,
    table_path: &Path,
) -> Result<CorrespondenceTable> {
    let mut reader = fasta::open_reader(genome)?;
    let out = File::create(out_fasta)
        .with_context(|| format!("Failed to create normalized assembly: {}", out_fasta.display()))?;
    let mut writer = noodles_fasta::io::Writer::new(BufWriter::new(out));

    let mut table = CorrespondenceTable::new();
    for (counter, result) in reader.records().enumerate() {
        let record = result?;
        let original = fasta::full_header(&record)?;
        let normalized = format!("Contig{counter}");

        let definition = Definition::new(normalized.clone(), None);
        let bases: &[u8] = record.sequence().as_ref();
        writer.write_record(&Record::new(definition, Sequence::from(bases.to_vec())))?;

        table.insert(normalized, original);
    }
    writer.get_mut().flush()?;

    table.save(table_path)?;
    info!("Renamed {} sequence(s); correspondence table: {}", table.len(), table_path.display());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    #[test]
    fn test_strip_polished_suffix() {
        assert_eq!(strip_polished_suffix("Contig0_polished"), "Contig0");
        assert_eq!(strip_polished_suffix("Contig0"), "Contig0");
        assert_eq!(strip_polished_suffix("_polished"), "");
    }

    #[test]
    fn test_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("correspondence.tsv");

        let mut table = CorrespondenceTable::new();
        table.insert("Contig0".to_string(), "contig A".to_string());
        table.insert("Contig1".to_string(), "contig#1".to_string());
        table.save(&path).unwrap();

        let loaded = CorrespondenceTable::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.resolve("Contig0"), Some("contig A"));
        assert_eq!(loaded.resolve("Contig1"), Some("contig#1"));
        assert_eq!(loaded.resolve("Contig2"), None);
    }

    #[test]
    fn test_load_missing_table_is_fatal() {
        assert!(CorrespondenceTable::load(Path::new("/nonexistent/table.tsv")).is_err());
    }

    #[test]
    fn test_normalize_assembly() {
        let dir = TempDir::new().unwrap();
        let genome = dir.path().join("genome.fasta");
        let mut file = File::create(&genome).unwrap();
        writeln!(file, ">contig A\nACGT\n>contig#1\nTTTT").unwrap();
        drop(file);

        let out = dir.path().join("assembly.fasta");
        let table_path = dir.path().join("correspondence.tsv");
        let table = normalize_assembly(&genome, &out, &table_path).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("Contig0"), Some("contig A"));
        assert_eq!(table.resolve("Contig1"), Some("contig#1"));

        // normalized output parses and carries the new names
        let mut reader = fasta::open_reader(&out).unwrap();
        let names: Vec<String> = reader
            .records()
            .map(|r| fasta::record_name(&r.unwrap()).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Contig0".to_string(), "Contig1".to_string()]);

        // round trip: every normalized name resolves back to the original
        for (normalized, original) in
            [("Contig0", "contig A"), ("Contig1", "contig#1")]
        {
            assert_eq!(table.resolve(normalized), Some(original));
        }
    }
}
