//! Per-partition alignment subset extraction.
//!
//! Each partition's region list selects the alignment records whose
//! reference sequence belongs to that partition. The alignment toolkit does
//! the actual record filtering: one `samtools view` per partition, writing to
//! a distinct ordinal-namespaced path. Secondary and supplementary records
//! are excluded (`-F 0x900`) so each read contributes evidence exactly once.
//!
//! Extractions are independent and run concurrently; any failure is fatal to
//! the whole run and aborts before any polishing job is scheduled.

use crate::errors::PolishError;
use crate::logging::OperationTimer;
use crate::partition::{self, Partition};
use crate::workdir::{command_line, CmdLog, WorkDir};
use anyhow::{Context, Result};
use log::error;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// SAM flag mask for secondary (0x100) + supplementary (0x800) records.
const SECONDARY_OR_SUPPLEMENTARY: &str = "0x900";

/// Extracts one alignment subset per partition from the sorted, indexed
/// alignment file.
///
/// All extraction processes are launched, all are waited on, and the worst
/// non-zero exit status is propagated. Nothing downstream runs after a
/// failure.
///
/// # Errors
/// Returns [`PolishError::CommandFailed`] for the worst failing extraction,
/// or an I/O error if a process cannot be spawned.
pub fn extract_partition_alignments(
    partitions: &[Partition],
    alignments: &Path,
    work: &WorkDir,
    cmds: &mut CmdLog,
) -> Result<()> {
    let timer = OperationTimer::new("Extracting alignments for each chunk");
    let chunk_bams_dir = work.chunk_bams_dir();

    let mut children: Vec<(Child, String, usize)> = Vec::with_capacity(partitions.len());
    for p in partitions {
        let out = chunk_bams_dir.join(partition::chunk_bam_name(p.ordinal));
        let mut command = Command::new("samtools");
        command
            .arg("view")
            .arg("-b")
            .arg("-M")
            .arg("-L")
            .arg(&p.regions)
            .arg("-F")
            .arg(SECONDARY_OR_SUPPLEMENTARY)
            .arg("-o")
            .arg(&out)
            .arg(alignments);

        let text = command_line(&command);
        cmds.record(&text)?;
        let child = command
            .stdout(Stdio::null())
            .stderr(Stdio::from(work.log_file("samtools_extract.e")?))
            .spawn()
            .context("Failed to spawn samtools view")?;
        children.push((child, text, p.ordinal));
    }

    let mut worst: Option<(String, i32)> = None;
    for (mut child, text, ordinal) in children {
        let status = child.wait().context("Failed to wait on samtools view")?;
        if !status.success() {
            let code = status.code().unwrap_or(-1);
            error!("Alignment extraction failed for partition {ordinal}: exit code {code}, command: {text}");
            if worst.as_ref().map_or(true, |(_, worst_code)| code > *worst_code) {
                worst = Some((text, code));
            }
        }
    }

    if let Some((command, code)) = worst {
        return Err(PolishError::CommandFailed { command, code }.into());
    }
    timer.done_with_count(partitions.len(), "chunks");
    Ok(())
}
