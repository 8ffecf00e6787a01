//! Coverage-based genome masking.
//!
//! Optional preprocessing for assemblies with collapsed repeats: positions
//! whose read depth exceeds a threshold are replaced with `N` so the polisher
//! cannot be misled by piled-up evidence. Depth comes from
//! `bedtools genomecov -d` over the sorted alignment file.

use crate::errors::PolishError;
use crate::fasta;
use crate::logging::OperationTimer;
use crate::workdir::command_line;
use anyhow::{Context, Result};
use log::info;
use noodles::fasta as noodles_fasta;
use noodles_fasta::record::{Definition, Record, Sequence};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Command, Stdio};

/// Summary of one masking pass.
#[derive(Debug, Default)]
pub struct MaskReport {
    /// Total positions replaced with `N`.
    pub masked_positions: usize,
    /// Number of sequences with at least one masked position.
    pub masked_sequences: usize,
}

/// Runs `bedtools genomecov -d` over `bam`, writing per-base depth to
/// `coverage_out`.
///
/// # Errors
/// Fatal on a non-zero exit.
pub fn compute_coverage(bam: &Path, coverage_out: &Path, stderr_log: &Path) -> Result<()> {
    let timer = OperationTimer::new("Computing per-base coverage");
    let mut command = Command::new("bedtools");
    command.arg("genomecov").arg("-ibam").arg(bam).arg("-d");
    let text = command_line(&command);

    let out = File::create(coverage_out)
        .with_context(|| format!("Failed to create {}", coverage_out.display()))?;
    let err = File::create(stderr_log)
        .with_context(|| format!("Failed to create {}", stderr_log.display()))?;
    let status = command
        .stdout(Stdio::from(out))
        .stderr(Stdio::from(err))
        .status()
        .context("Failed to run bedtools genomecov")?;
    if !status.success() {
        return Err(PolishError::CommandFailed {
            command: text,
            code: status.code().unwrap_or(-1),
        }
        .into());
    }
    timer.done();
    Ok(())
}

/// Parses a `bedtools genomecov -d` depth table and collects the 1-based
/// positions whose depth is strictly greater than `min_coverage`, grouped by
/// sequence name.
///
/// # Errors
/// Returns an error on malformed depth lines.
pub fn high_coverage_positions(
    coverage: &Path,
    min_coverage: u32,
) -> Result<HashMap<String, Vec<usize>>> {
    let file = File::open(coverage)
        .with_context(|| format!("Failed to open coverage table {}", coverage.display()))?;
    let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(name), Some(pos), Some(depth)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(PolishError::InvalidFileFormat {
                file_type: "coverage table".to_string(),
                path: coverage.display().to_string(),
                reason: format!("line {} is not 3-column TSV", number + 1),
            }
            .into());
        };
        let pos: usize = pos
            .parse()
            .with_context(|| format!("Malformed position on coverage line {}", number + 1))?;
        let depth: u32 = depth
            .parse()
            .with_context(|| format!("Malformed depth on coverage line {}", number + 1))?;
        if depth > min_coverage {
            positions.entry(name.to_string()).or_default().push(pos);
        }
    }
    Ok(positions)
}

/// Masks every high-coverage position of `genome` to `N` and writes the
/// masked assembly to `output`. The per-base depth table is kept alongside
/// the output for inspection.
///
/// # Errors
/// Returns an error if any external step fails or the genome cannot be
/// rewritten.
pub fn mask_genome(
    bam: &Path,
    genome: &Path,
    min_coverage: u32,
    output: &Path,
) -> Result<MaskReport> {
    let coverage_path = output.with_extension("coverage.tsv");
    let stderr_log = output.with_extension("bedtools.e");
    compute_coverage(bam, &coverage_path, &stderr_log)?;

    let positions = high_coverage_positions(&coverage_path, min_coverage)?;
    info!(
        "Masking positions with coverage > {min_coverage} in {} sequence(s)",
        positions.len()
    );

    let timer = OperationTimer::new("Writing masked genome");
    let out = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = noodles_fasta::io::Writer::new(BufWriter::new(out));

    let mut report = MaskReport::default();
    let mut reader = fasta::open_reader(genome)?;
    for result in reader.records() {
        let record = result?;
        let name = fasta::record_name(&record)?.to_string();
        let raw: &[u8] = record.sequence().as_ref();
        let mut bases = raw.to_vec();
        if let Some(masked) = positions.get(&name) {
            let mut touched = false;
            for &pos in masked {
                // depth table positions are 1-based
                if let Some(base) = bases.get_mut(pos - 1) {
                    *base = b'N';
                    report.masked_positions += 1;
                    touched = true;
                }
            }
            if touched {
                report.masked_sequences += 1;
            }
        }
        let definition = Definition::new(
            record.name().to_vec(),
            record.description().map(|d| d.to_vec()),
        );
        writer.write_record(&Record::new(definition, Sequence::from(bases)))?;
    }
    writer.get_mut().flush()?;

    timer.done();
    Ok(report)
}
