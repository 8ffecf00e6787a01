//! Genome partitioning by cumulative sequence length.
//!
//! The assembly is split into partitions whose cumulative base counts
//! approximate `total / count`, iterating sequences in input order and never
//! splitting a sequence. Each partition gets a FASTA subset and a parallel
//! region list (TSV: name, 0, length) used to select its alignment records.
//! Partitions are carried as an explicit ordinal-addressed vector so dispatch
//! and merge ordering is structural rather than derived from directory
//! listings.

use crate::fasta;
use crate::logging::OperationTimer;
use crate::workdir;
use anyhow::{Context, Result};
use log::{debug, info};
use noodles::fasta as noodles_fasta;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// FASTA subset file name for a partition ordinal.
#[must_use]
pub fn chunk_fasta_name(ordinal: usize) -> String {
    format!("chunk_{ordinal}.fasta")
}

/// Region list file name for a partition ordinal.
#[must_use]
pub fn chunk_regions_name(ordinal: usize) -> String {
    format!("chunk_{ordinal}.bed")
}

/// Alignment subset file name for a partition ordinal.
#[must_use]
pub fn chunk_bam_name(ordinal: usize) -> String {
    format!("chunk_{ordinal}.bam")
}

/// Polished sequence output file name for a partition ordinal.
#[must_use]
pub fn polished_fasta_name(ordinal: usize) -> String {
    format!("chunk_{ordinal}.fasta")
}

/// Change log output file name for a partition ordinal.
#[must_use]
pub fn changes_name(ordinal: usize) -> String {
    format!("chunk_{ordinal}.changes")
}

/// One balanced, disjoint subset of the assembly, processed as an independent
/// unit of work.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Stable 1-based ordinal; governs file naming and merge order.
    pub ordinal: usize,
    /// FASTA subset holding this partition's sequences.
    pub fasta: PathBuf,
    /// Region list covering each sequence of the subset end to end.
    pub regions: PathBuf,
    /// Number of sequences assigned to this partition.
    pub sequences: usize,
    /// Cumulative base count of the assigned sequences.
    pub bases: u64,
}

/// The ordered set of partitions produced for one run.
#[derive(Debug, Default)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
}

/// Open writers for the partition currently being filled.
struct OpenChunk {
    fasta: noodles_fasta::io::Writer<BufWriter<File>>,
    regions: BufWriter<File>,
    descriptor: Partition,
}

impl OpenChunk {
    fn create(dir: &Path, ordinal: usize) -> Result<Self> {
        let fasta_path = dir.join(chunk_fasta_name(ordinal));
        let regions_path = dir.join(chunk_regions_name(ordinal));
        let fasta_file = File::create(&fasta_path)
            .with_context(|| format!("Failed to create {}", fasta_path.display()))?;
        let regions_file = File::create(&regions_path)
            .with_context(|| format!("Failed to create {}", regions_path.display()))?;
        Ok(Self {
            fasta: noodles_fasta::io::Writer::new(BufWriter::new(fasta_file)),
            regions: BufWriter::new(regions_file),
            descriptor: Partition {
                ordinal,
                fasta: fasta_path,
                regions: regions_path,
                sequences: 0,
                bases: 0,
            },
        })
    }

    fn write(&mut self, record: &noodles_fasta::Record) -> Result<()> {
        let name = fasta::record_name(record)?;
        let length = record.sequence().len();
        self.fasta.write_record(record)?;
        writeln!(self.regions, "{name}\t0\t{length}")?;
        self.descriptor.sequences += 1;
        self.descriptor.bases += length as u64;
        Ok(())
    }

    fn seal(mut self) -> Result<Partition> {
        self.fasta.get_mut().flush()?;
        self.regions.flush()?;
        Ok(self.descriptor)
    }
}

impl PartitionSet {
    /// Partitions `genome` into up to `count` balanced chunks under `dir`.
    ///
    /// Sequences are assigned in input order; a partition is sealed once its
    /// cumulative length reaches `total / count`, unless it is the last
    /// available ordinal (which absorbs the remainder). A single oversized
    /// sequence may push one partition past the target. Fewer than `count`
    /// partitions are produced when the collection has fewer sequences.
    ///
    /// # Errors
    /// Returns an error if the genome cannot be read or chunk files cannot be
    /// written.
    pub fn build(genome: &Path, count: usize, dir: &Path) -> Result<Self> {
        let total = fasta::genome_size(genome)?;
        let target = total as f64 / count as f64;
        let timer = OperationTimer::new(&format!(
            "Fragmenting the genome into {count} chunks of ~{} bases",
            target.round() as u64
        ));

        let mut partitions: Vec<Partition> = Vec::with_capacity(count);
        let mut current: Option<OpenChunk> = None;

        let mut reader = fasta::open_reader(genome)?;
        for result in reader.records() {
            let record = result?;

            let full = current
                .as_ref()
                .is_some_and(|c| c.descriptor.bases as f64 >= target && c.descriptor.ordinal != count);
            if full {
                if let Some(chunk) = current.take() {
                    partitions.push(chunk.seal()?);
                }
            }

            if current.is_none() {
                current = Some(OpenChunk::create(dir, partitions.len() + 1)?);
            }
            if let Some(chunk) = current.as_mut() {
                chunk.write(&record)?;
            }
        }

        if let Some(chunk) = current {
            partitions.push(chunk.seal()?);
        }

        if partitions.len() < count {
            debug!(
                "Produced {} partition(s) for {count} requested (fewer sequences than partitions)",
                partitions.len()
            );
        }
        timer.done_with_count(partitions.len(), "partitions");
        Ok(Self { partitions })
    }

    /// Degenerate single-partition path: the whole assembly and its alignment
    /// file are linked in as partition 1, skipping the extraction machinery.
    ///
    /// # Errors
    /// Returns an error if the links cannot be created.
    pub fn degenerate(
        assembly: &Path,
        alignments: &Path,
        chunks_dir: &Path,
        chunk_bams_dir: &Path,
    ) -> Result<Self> {
        info!("Single polishing job requested, processing the assembly as one partition");
        let fasta_path = chunks_dir.join(chunk_fasta_name(1));
        let bam_path = chunk_bams_dir.join(chunk_bam_name(1));
        workdir::link_or_copy(assembly, &fasta_path)?;
        workdir::link_or_copy(alignments, &bam_path)?;
        let partition = Partition {
            ordinal: 1,
            fasta: fasta_path,
            regions: chunks_dir.join(chunk_regions_name(1)),
            sequences: 0,
            bases: 0,
        };
        Ok(Self { partitions: vec![partition] })
    }

    /// Number of partitions produced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns true when no partitions were produced (empty input).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// The partitions in ascending ordinal order.
    #[must_use]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }
}
