//! Bounded worker pool for external polishing processes.
//!
//! One polishing invocation runs per partition, never more than the
//! configured limit at once. All job specs are queued up front on a channel;
//! a fixed number of worker threads each pull a spec, spawn the external
//! process, and block on `wait()`, so a slot frees the moment any running job
//! terminates and the next queued job starts regardless of partition order.
//!
//! Failure policy is drain-all-then-fail: a non-zero exit is recorded but
//! never kills sibling jobs, and the error only surfaces once every launched
//! job has reached a terminal state. No merge happens after a failure.

use crate::errors::PolishError;
use crate::partition::{self, Partition};
use crate::workdir::command_line;
use anyhow::{Context, Result};
use crossbeam_channel::unbounded;
use log::{debug, error, info};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// One external polishing invocation over one partition's data.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Partition ordinal; namespaces every path below.
    pub ordinal: usize,
    /// Sequence subset input.
    pub fasta: PathBuf,
    /// Alignment subset input.
    pub bam: PathBuf,
    /// Polished sequence output.
    pub polished: PathBuf,
    /// Change log output.
    pub changes: PathBuf,
}

impl JobSpec {
    /// Builds the spec for a partition, with inputs and ordinal-namespaced
    /// outputs resolved against the run's working directories.
    #[must_use]
    pub fn for_partition(p: &Partition, chunk_bams_dir: &Path, polished_dir: &Path) -> Self {
        Self {
            ordinal: p.ordinal,
            fasta: p.fasta.clone(),
            bam: chunk_bams_dir.join(partition::chunk_bam_name(p.ordinal)),
            polished: polished_dir.join(partition::polished_fasta_name(p.ordinal)),
            changes: polished_dir.join(partition::changes_name(p.ordinal)),
        }
    }
}

/// Terminal state of one job, handed to the merge stage as a read-only
/// result descriptor.
#[derive(Debug)]
pub struct JobOutcome {
    /// Partition ordinal.
    pub ordinal: usize,
    /// The command line that was run.
    pub command: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code; `None` when the process was killed by a signal or could
    /// not be spawned.
    pub exit_code: Option<i32>,
}

/// Supervises the external polishing processes for one run.
#[derive(Debug)]
pub struct JobRunner {
    binary: PathBuf,
    max_parallel: usize,
    logs_dir: PathBuf,
}

impl JobRunner {
    /// Creates a runner for `binary` bounded at `max_parallel` concurrent
    /// processes, capturing per-job output under `logs_dir`.
    #[must_use]
    pub fn new(binary: PathBuf, max_parallel: usize, logs_dir: PathBuf) -> Self {
        Self { binary, max_parallel: max_parallel.max(1), logs_dir }
    }

    /// The command line a spec would run, for journaling.
    #[must_use]
    pub fn command_text(&self, spec: &JobSpec) -> String {
        command_line(&self.command_for(spec))
    }

    fn command_for(&self, spec: &JobSpec) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-b")
            .arg(&spec.bam)
            .arg("-f")
            .arg(&spec.fasta)
            .arg("-o")
            .arg(&spec.polished)
            .arg("-c")
            .arg(&spec.changes);
        command
    }

    /// Runs every job, bounded at the configured concurrency, and drains the
    /// whole batch before reporting.
    ///
    /// Outcomes are returned in ascending ordinal order. If any job failed,
    /// each failure is logged with its partition, exit code, and command, and
    /// [`PolishError::JobsFailed`] is returned after the drain; callers must
    /// not merge in that case.
    ///
    /// # Errors
    /// Returns [`PolishError::JobsFailed`] when one or more jobs exit
    /// non-zero (or fail to spawn).
    pub fn run(&self, specs: Vec<JobSpec>) -> Result<Vec<JobOutcome>> {
        if specs.is_empty() {
            return Ok(Vec::new());
        }
        let total = specs.len();
        let workers = self.max_parallel.min(total);
        info!("Launching {total} polishing job(s), {workers} at a time");

        let (spec_tx, spec_rx) = unbounded::<JobSpec>();
        let (outcome_tx, outcome_rx) = unbounded::<JobOutcome>();
        for spec in specs {
            if spec_tx.send(spec).is_err() {
                break;
            }
        }
        drop(spec_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let spec_rx = spec_rx.clone();
                let outcome_tx = outcome_tx.clone();
                scope.spawn(move || {
                    while let Ok(spec) = spec_rx.recv() {
                        let outcome = self.launch(&spec);
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(spec_rx);
        drop(outcome_tx);

        let mut outcomes: Vec<JobOutcome> = outcome_rx.try_iter().collect();
        outcomes.sort_unstable_by_key(|outcome| outcome.ordinal);

        let failed = outcomes.iter().filter(|outcome| !outcome.success).count();
        if failed > 0 {
            for outcome in outcomes.iter().filter(|outcome| !outcome.success) {
                let code = outcome
                    .exit_code
                    .map_or_else(|| "none (signal or spawn failure)".to_string(), |c| c.to_string());
                error!(
                    "Polishing failed for partition {}: exit code {code}, command: {}",
                    outcome.ordinal, outcome.command
                );
            }
            return Err(PolishError::JobsFailed { failed, total }.into());
        }
        Ok(outcomes)
    }

    fn launch(&self, spec: &JobSpec) -> JobOutcome {
        let command_text = self.command_text(spec);
        debug!("Partition {}: {command_text}", spec.ordinal);
        match self.spawn_and_wait(spec) {
            Ok(status) => JobOutcome {
                ordinal: spec.ordinal,
                command: command_text,
                success: status.success(),
                exit_code: status.code(),
            },
            Err(e) => {
                error!("Partition {}: failed to run polishing process: {e:#}", spec.ordinal);
                JobOutcome {
                    ordinal: spec.ordinal,
                    command: command_text,
                    success: false,
                    exit_code: None,
                }
            }
        }
    }

    fn spawn_and_wait(&self, spec: &JobSpec) -> Result<std::process::ExitStatus> {
        let stdout = File::create(self.logs_dir.join(format!("polish_{}.o", spec.ordinal)))
            .context("Failed to create job stdout capture")?;
        let stderr = File::create(self.logs_dir.join(format!("polish_{}.e", spec.ordinal)))
            .context("Failed to create job stderr capture")?;
        let mut child = self
            .command_for(spec)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.binary.display()))?;
        child.wait().context("Failed to wait on polishing process")
    }
}
