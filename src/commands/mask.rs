//! `mask`: replace high-coverage positions of an assembly with `N`.
//!
//! Optional preprocessing for assemblies with collapsed repeats: regions
//! accumulating more read depth than expected are masked so the polisher
//! cannot be misled by piled-up evidence from several genome copies.

use crate::commands::command::Command;
use anyhow::Result;
use asmpolish_lib::masking;
use asmpolish_lib::validation::{self, validate_file_exists};
use clap::Parser;
use log::info;
use std::path::PathBuf;

/// Command-line arguments for `mask`
#[derive(Parser, Debug)]
#[command(
    name = "mask",
    author,
    version,
    about = "\x1b[38;5;72m[PREPROCESS]\x1b[0m \x1b[36mMask high-coverage regions with N\x1b[0m",
    long_about = "
Masks high-coverage positions of an assembly.

Per-base depth is computed with `bedtools genomecov -d` over the sorted
alignment file; every position whose depth is strictly greater than
--min-coverage is replaced with N in the output assembly. The depth table is
kept next to the output for inspection.
"
)]
#[command(verbatim_doc_comment)]
pub struct Mask {
    /// Sorted alignment file used for the coverage computation
    #[arg(short = 'b', long = "bam")]
    pub bam: PathBuf,

    /// Genome assembly to mask
    #[arg(short = 'g', long)]
    pub genome: PathBuf,

    /// Positions with coverage strictly greater than this are masked
    #[arg(short = 'm', long = "min-coverage", default_value_t = 5)]
    pub min_coverage: u32,

    /// Masked assembly output
    #[arg(short = 'o', long, default_value = "genome_masked.fasta")]
    pub output: PathBuf,
}

impl Command for Mask {
    fn execute(&self) -> Result<()> {
        validate_file_exists(&self.bam, "Alignment file")?;
        validate_file_exists(&self.genome, "Input genome")?;
        validation::check_dependencies(&["bedtools"])?;

        let report =
            masking::mask_genome(&self.bam, &self.genome, self.min_coverage, &self.output)?;
        info!(
            "Masked {} position(s) across {} sequence(s); output: {}",
            report.masked_positions,
            report.masked_sequences,
            self.output.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Mask::command().debug_assert();
    }

    #[test]
    fn test_default_threshold() {
        let mask = Mask::parse_from(["mask", "-b", "aln.bam", "-g", "genome.fasta"]);
        assert_eq!(mask.min_coverage, 5);
        assert_eq!(mask.output, PathBuf::from("genome_masked.fasta"));
    }
}
