//! Read alignment wrappers.
//!
//! The aligner and the alignment toolkit are external collaborators; this
//! module only builds their command lines, journals them, captures their
//! output under `logs/`, and turns a non-zero exit into a fatal error.
//!
//! Paired-end reads go through `bwa mem`, long reads through `minimap2`
//! (secondary alignments suppressed); both are piped straight into
//! `samtools sort`. Multiple read pairs are concatenated through shell
//! process substitution, which is why the mapping pipelines run under
//! `bash -c`.

use crate::errors::PolishError;
use crate::logging::OperationTimer;
use crate::workdir::{command_line, CmdLog, WorkDir};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

fn run_logged(mut command: Command, text: &str) -> Result<()> {
    let status = command
        .status()
        .with_context(|| format!("Failed to run: {text}"))?;
    if !status.success() {
        return Err(PolishError::CommandFailed {
            command: text.to_string(),
            code: status.code().unwrap_or(-1),
        }
        .into());
    }
    Ok(())
}

/// Builds the BWA index for the assembly.
///
/// # Errors
/// Fatal on a non-zero exit.
pub fn bwa_index(assembly: &Path, work: &WorkDir, cmds: &mut CmdLog) -> Result<()> {
    let timer = OperationTimer::new("Generating bwa index");
    let mut command = Command::new("bwa");
    command.arg("index").arg(assembly);
    let text = command_line(&command);
    cmds.record(&text)?;
    command
        .stdout(Stdio::from(work.log_file("bwa_index.o")?))
        .stderr(Stdio::from(work.log_file("bwa_index.e")?));
    run_logged(command, &text)?;
    timer.done();
    Ok(())
}

fn reads_list(reads: &[impl AsRef<Path>]) -> String {
    reads.iter().map(|r| r.as_ref().display().to_string()).collect::<Vec<_>>().join(" ")
}

/// Maps paired-end reads against the assembly and sorts the result into
/// `out_bam`.
///
/// # Errors
/// Fatal on a non-zero exit of the mapping pipeline.
pub fn map_short_reads(
    assembly: &Path,
    pe1: &[impl AsRef<Path>],
    pe2: &[impl AsRef<Path>],
    threads: usize,
    samtools_mem: &str,
    out_bam: &Path,
    work: &WorkDir,
    cmds: &mut CmdLog,
) -> Result<()> {
    let timer = OperationTimer::new("Mapping reads on the assembly");
    let logs = work.logs_dir();

    let streamer =
        if pe1[0].as_ref().extension().is_some_and(|e| e == "gz") { "zcat" } else { "cat" };
    let mut line = format!("bwa mem -t {threads} {}", assembly.display());
    if pe1.len() > 1 {
        line.push_str(&format!(
            " <({streamer} {}) <({streamer} {})",
            reads_list(pe1),
            reads_list(pe2)
        ));
    } else {
        line.push_str(&format!(" {} {}", pe1[0].as_ref().display(), pe2[0].as_ref().display()));
    }
    line.push_str(&format!(
        " 2> {} | samtools sort -m {samtools_mem} -@ {threads} -o {} - 2> {}",
        logs.join("bwa_mem.e").display(),
        out_bam.display(),
        logs.join("samtools_sort.e").display()
    ));
    cmds.record(&line)?;

    let mut command = Command::new("bash");
    command.arg("-c").arg(&line);
    run_logged(command, &line)?;
    timer.done();
    Ok(())
}

/// Maps long reads against the assembly (no secondary alignments) and sorts
/// the result into `out_bam`.
///
/// # Errors
/// Fatal on a non-zero exit of the mapping pipeline.
pub fn map_long_reads(
    assembly: &Path,
    reads: &Path,
    threads: usize,
    samtools_mem: &str,
    out_bam: &Path,
    work: &WorkDir,
    cmds: &mut CmdLog,
) -> Result<()> {
    let timer = OperationTimer::new("Mapping long reads on the assembly");
    let logs = work.logs_dir();

    let line = format!(
        "minimap2 -t {threads} -a --secondary=no -x map-pb {} {} 2> {} \
         | samtools sort -m {samtools_mem} -@ {threads} -o {} - 2> {}",
        assembly.display(),
        reads.display(),
        logs.join("minimap2.e").display(),
        out_bam.display(),
        logs.join("samtools_sort.e").display()
    );
    cmds.record(&line)?;

    let mut command = Command::new("bash");
    command.arg("-c").arg(&line);
    run_logged(command, &line)?;
    timer.done();
    Ok(())
}

/// Indexes the sorted alignment file.
///
/// # Errors
/// Fatal on a non-zero exit.
pub fn index_alignment(bam: &Path, work: &WorkDir, cmds: &mut CmdLog) -> Result<()> {
    let timer = OperationTimer::new("Indexing the alignment file");
    let mut command = Command::new("samtools");
    command.arg("index").arg(bam);
    let text = command_line(&command);
    cmds.record(&text)?;
    command
        .stdout(Stdio::from(work.log_file("samtools_index.o")?))
        .stderr(Stdio::from(work.log_file("samtools_index.e")?));
    run_logged(command, &text)?;
    timer.done();
    Ok(())
}
