//! `polish`: partition the assembly, polish each partition in parallel, and
//! reassemble the results.
//!
//! # Workflow
//!
//! 1. Probe PATH for the external tools the run needs
//! 2. Create the output directory tree (fatal if it already exists)
//! 3. Map reads (bwa / minimap2 + samtools sort) or link in a pre-made BAM,
//!    normalizing sequence identifiers first when they contain characters
//!    the alignment toolkit cannot address
//! 4. Partition the assembly by cumulative length and extract one alignment
//!    subset per partition
//! 5. Run one polishing engine invocation per partition, bounded by `--jobs`
//! 6. Merge the per-partition outputs in ascending partition order, restore
//!    original identifiers, and optionally backfill unpolished sequences
//!
//! Any job failure is surfaced only after every launched job has terminated,
//! and no merged output is written in that case.

use crate::commands::command::Command;
use anyhow::{Context, Result};
use asmpolish_lib::errors::PolishError;
use asmpolish_lib::logging::format_duration;
use asmpolish_lib::merge;
use asmpolish_lib::naming::{self, CorrespondenceTable};
use asmpolish_lib::partition::PartitionSet;
use asmpolish_lib::scheduler::{JobRunner, JobSpec};
use asmpolish_lib::validation::{self, validate_file_exists, validate_positive};
use asmpolish_lib::workdir::{self, WorkDir};
use asmpolish_lib::{extract, fasta, mapping};
use clap::Parser;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Binary probed in PATH when `--bin` is not given.
const DEFAULT_ENGINE: &str = "polish-engine";

/// Command-line arguments for `polish`
#[derive(Parser, Debug)]
#[command(
    name = "polish",
    author,
    version,
    about = "\x1b[38;5;72m[PIPELINE]\x1b[0m   \x1b[36mPolish an assembly with mapped reads\x1b[0m",
    long_about = "
Polishes a genome assembly using read alignments.

The assembly is fragmented into balanced chunks, the sorted alignment file is
split into one subset per chunk, and the polishing engine runs over each chunk
with at most --jobs invocations in flight. Chunk outputs are merged back in
chunk order, so results are reproducible regardless of job completion order.

Reads can be supplied as paired-end FASTQ (--pe1/--pe2, repeatable), as long
reads (--single), or the mapping step can be skipped entirely by providing a
sorted BAM (-b). A BAM produced elsewhere must not contain sequence names with
characters outside [A-Za-z0-9_-].
"
)]
#[command(verbatim_doc_comment)]
pub struct Polish {
    /// Input genome assembly to polish
    #[arg(short = 'g', long)]
    pub genome: PathBuf,

    /// Fastq(.gz) paired-end file, pair 1 (can be given multiple times)
    #[arg(long = "pe1")]
    pub pe1: Vec<PathBuf>,

    /// Fastq(.gz) paired-end file, pair 2 (can be given multiple times)
    #[arg(long = "pe2")]
    pub pe2: Vec<PathBuf>,

    /// Long-read file (concatenate multiple files into one beforehand)
    #[arg(long, conflicts_with_all = ["pe1", "pe2"])]
    pub single: Option<PathBuf>,

    /// Skip mapping and use this sorted alignment file
    #[arg(short = 'b', long = "bam")]
    pub bam: Option<PathBuf>,

    /// Include unpolished sequences in the final output
    #[arg(short = 'u', long = "include-unpolished")]
    pub include_unpolished: bool,

    /// Output directory name
    #[arg(short = 'o', long, default_value = "asmpolish_results")]
    pub output: PathBuf,

    /// Threads for the aligner and alignment toolkit; also the number of
    /// genome chunks
    #[arg(short = 't', long, default_value_t = 8)]
    pub threads: usize,

    /// Maximum number of polishing jobs in flight (defaults to --threads)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Polishing engine binary (defaults to probing PATH for `polish-engine`)
    #[arg(long = "bin")]
    pub engine: Option<PathBuf>,

    /// Memory per samtools sort thread
    #[arg(long = "samtools-mem", default_value = "5G")]
    pub samtools_mem: String,
}

impl Polish {
    fn validate_reads(&self) -> Result<()> {
        if self.bam.is_some() || self.single.is_some() {
            return Ok(());
        }
        if self.pe1.is_empty() || self.pe2.is_empty() {
            return Err(PolishError::InvalidParameter {
                parameter: "pe1/pe2".to_string(),
                reason: "paired-end reads, long reads (--single), or a BAM (-b) are required"
                    .to_string(),
            }
            .into());
        }
        if self.pe1.len() != self.pe2.len() {
            return Err(PolishError::InvalidParameter {
                parameter: "pe1/pe2".to_string(),
                reason: format!(
                    "pair counts differ ({} vs {})",
                    self.pe1.len(),
                    self.pe2.len()
                ),
            }
            .into());
        }
        Ok(())
    }

    fn check_tools(&self) -> Result<()> {
        let mut tools = vec!["samtools"];
        if self.bam.is_none() {
            if self.single.is_some() {
                tools.push("minimap2");
            } else {
                tools.push("bwa");
            }
        }
        validation::check_dependencies(&tools)?;
        Ok(())
    }

    fn resolve_engine(&self) -> Result<PathBuf> {
        match &self.engine {
            Some(engine) => {
                if engine.is_file() {
                    return Ok(engine.clone());
                }
                if let Some(found) = engine.to_str().and_then(validation::find_in_path) {
                    return Ok(found);
                }
                Err(PolishError::MissingDependency { tool: engine.display().to_string() }.into())
            }
            None => {
                let found = validation::find_in_path(DEFAULT_ENGINE)
                    .ok_or_else(|| PolishError::MissingDependency {
                        tool: DEFAULT_ENGINE.to_string(),
                    })?;
                info!("Using polishing engine: {}", found.display());
                Ok(found)
            }
        }
    }

    /// Map reads (or link the supplied BAM) and index the sorted alignment
    /// file, returning the correspondence table when identifiers had to be
    /// normalized.
    fn prepare_alignments(
        &self,
        genome: &Path,
        work: &WorkDir,
        assembly: &Path,
        sorted_bam: &Path,
        table_path: &Path,
    ) -> Result<Option<CorrespondenceTable>> {
        if let Some(bam) = &self.bam {
            let bam = fs::canonicalize(bam)
                .with_context(|| format!("Alignment file not found: {}", bam.display()))?;
            if fasta::headers_need_normalizing(genome)? {
                return Err(PolishError::InvalidIdentifiers {
                    path: genome.display().to_string(),
                }
                .into());
            }
            workdir::link_or_copy(genome, assembly)?;
            workdir::link_or_copy(&bam, sorted_bam)?;
            let mut cmds = work.cmd_log("samtools_index.cmds")?;
            mapping::index_alignment(sorted_bam, work, &mut cmds)?;
            return Ok(None);
        }

        let table = if fasta::headers_need_normalizing(genome)? {
            info!("Non-conforming characters detected in sequence headers, renaming sequences");
            Some(naming::normalize_assembly(genome, assembly, table_path)?)
        } else {
            workdir::link_or_copy(genome, assembly)?;
            None
        };

        if let Some(single) = &self.single {
            let reads = fs::canonicalize(single)
                .with_context(|| format!("Long-read file not found: {}", single.display()))?;
            let mut cmds = work.cmd_log("mapping.cmds")?;
            mapping::map_long_reads(
                assembly,
                &reads,
                self.threads,
                &self.samtools_mem,
                sorted_bam,
                work,
                &mut cmds,
            )?;
        } else {
            let pe1 = canonicalize_all(&self.pe1)?;
            let pe2 = canonicalize_all(&self.pe2)?;
            let mut cmds = work.cmd_log("bwa_index.cmds")?;
            mapping::bwa_index(assembly, work, &mut cmds)?;
            let mut cmds = work.cmd_log("mapping.cmds")?;
            mapping::map_short_reads(
                assembly,
                &pe1,
                &pe2,
                self.threads,
                &self.samtools_mem,
                sorted_bam,
                work,
                &mut cmds,
            )?;
        }
        let mut cmds = work.cmd_log("samtools_index.cmds")?;
        mapping::index_alignment(sorted_bam, work, &mut cmds)?;
        Ok(table)
    }
}

fn canonicalize_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths
        .iter()
        .map(|p| {
            fs::canonicalize(p).with_context(|| format!("Read file not found: {}", p.display()))
        })
        .collect()
}

/// Removes the normalized intermediate assembly (and its aligner index
/// files) plus the unmerged temporary outputs.
fn cleanup_normalized_intermediates(root: &Path) -> Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("assembly.fasta") {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

impl Command for Polish {
    fn execute(&self) -> Result<()> {
        let start = Instant::now();
        let jobs = self.jobs.unwrap_or(self.threads);
        validate_positive(self.threads, "threads")?;
        validate_positive(jobs, "jobs")?;
        validate_file_exists(&self.genome, "Input genome")?;
        self.validate_reads()?;

        let engine = self.resolve_engine()?;
        self.check_tools()?;

        let genome = fs::canonicalize(&self.genome)
            .with_context(|| format!("Input genome not found: {}", self.genome.display()))?;

        let work = WorkDir::create(&self.output)?;
        let assembly = work.root().join("assembly.fasta");
        let sorted_bam = work.bam_dir().join("aln.sorted.bam");
        let table_path = work.root().join("correspondence.tsv");

        let table =
            self.prepare_alignments(&genome, &work, &assembly, &sorted_bam, &table_path)?;

        let partitions = if jobs > 1 {
            let set = PartitionSet::build(&assembly, self.threads, &work.chunks_dir())?;
            let mut cmds = work.cmd_log("extract.cmds")?;
            extract::extract_partition_alignments(
                set.partitions(),
                &sorted_bam,
                &work,
                &mut cmds,
            )?;
            set
        } else {
            PartitionSet::degenerate(
                &assembly,
                &sorted_bam,
                &work.chunks_dir(),
                &work.chunk_bams_dir(),
            )?
        };

        let runner = JobRunner::new(engine, jobs, work.logs_dir());
        let specs: Vec<JobSpec> = partitions
            .partitions()
            .iter()
            .map(|p| JobSpec::for_partition(p, &work.chunk_bams_dir(), &work.polished_dir()))
            .collect();
        {
            let mut cmds = work.cmd_log("polish.cmds")?;
            for spec in &specs {
                cmds.record(&runner.command_text(spec))?;
            }
        }
        runner.run(specs)?;

        let tmp_fasta = work.root().join("polished.fasta.tmp");
        let tmp_changes = work.root().join("polished.changes.tmp");
        merge::merge_partition_outputs(
            &work.polished_dir(),
            partitions.len(),
            &tmp_fasta,
            &tmp_changes,
        )?;

        let final_fasta = work.root().join("polished.fasta");
        let final_changes = work.root().join("polished.changes");
        match &table {
            Some(table) => {
                let report = merge::restore_identifiers(
                    &tmp_fasta,
                    &tmp_changes,
                    table,
                    &final_fasta,
                    &final_changes,
                )?;
                report.log_summary();
                fs::remove_file(&tmp_fasta)?;
                fs::remove_file(&tmp_changes)?;
                cleanup_normalized_intermediates(work.root())?;
            }
            None => {
                fs::rename(&tmp_fasta, &final_fasta)?;
                fs::rename(&tmp_changes, &final_changes)?;
            }
        }

        if self.include_unpolished {
            merge::append_unpolished(&genome, &final_fasta)?;
        }

        info!("Results: {} and {}", final_fasta.display(), final_changes.display());
        info!("Total running time: {}", format_duration(start.elapsed()));
        Ok(())
    }
}
