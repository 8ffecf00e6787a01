//! Output directory bootstrap and command journaling.
//!
//! Every run works inside a freshly created output directory; an existing
//! directory is a fatal collision so a run can never mix its outputs with a
//! previous one. External tool output goes to `logs/`, and every external
//! command line is appended to a journal under `cmds/` so a failed run can be
//! replayed by hand.

use crate::errors::PolishError;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

const BAM_DIR: &str = "bam";
const LOGS_DIR: &str = "logs";
const CMDS_DIR: &str = "cmds";
const CHUNKS_DIR: &str = "chunks";
const CHUNK_BAMS_DIR: &str = "chunks_bam";
const POLISHED_DIR: &str = "polished_chunks";

/// The per-run output directory tree.
#[derive(Debug)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Creates the output directory and its working subdirectories.
    ///
    /// # Errors
    /// Returns [`PolishError::OutputDirExists`] when the target already
    /// exists, or an I/O error when it cannot be created.
    pub fn create(root: &Path) -> Result<Self> {
        if root.exists() {
            return Err(PolishError::OutputDirExists { path: root.display().to_string() }.into());
        }
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create output directory {}", root.display()))?;
        // absolute root, so links created inside the tree stay valid
        let root = fs::canonicalize(root)?;
        for sub in [BAM_DIR, LOGS_DIR, CMDS_DIR, CHUNKS_DIR, CHUNK_BAMS_DIR, POLISHED_DIR] {
            fs::create_dir(root.join(sub))?;
        }
        Ok(Self { root })
    }

    /// Root of the output tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the sorted alignment file.
    #[must_use]
    pub fn bam_dir(&self) -> PathBuf {
        self.root.join(BAM_DIR)
    }

    /// Directory for external tool stdout/stderr captures.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    /// Directory for command journals.
    #[must_use]
    pub fn cmds_dir(&self) -> PathBuf {
        self.root.join(CMDS_DIR)
    }

    /// Directory for genome partitions and their region lists.
    #[must_use]
    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join(CHUNKS_DIR)
    }

    /// Directory for per-partition alignment subsets.
    #[must_use]
    pub fn chunk_bams_dir(&self) -> PathBuf {
        self.root.join(CHUNK_BAMS_DIR)
    }

    /// Directory for per-partition polishing outputs.
    #[must_use]
    pub fn polished_dir(&self) -> PathBuf {
        self.root.join(POLISHED_DIR)
    }

    /// Opens (create + append) a capture file under `logs/`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn log_file(&self, name: &str) -> Result<File> {
        let path = self.logs_dir().join(name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))
    }

    /// Opens a command journal under `cmds/`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn cmd_log(&self, name: &str) -> Result<CmdLog> {
        CmdLog::open(&self.cmds_dir().join(name))
    }
}

/// Append-only journal of the external command lines a run issued.
#[derive(Debug)]
pub struct CmdLog {
    file: File,
}

impl CmdLog {
    /// Opens (create + append) the journal at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open command journal {}", path.display()))?;
        Ok(Self { file })
    }

    /// Appends one command line to the journal.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn record(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }
}

/// Renders a [`Command`] as the shell-style line recorded in journals and
/// error messages.
#[must_use]
pub fn command_line(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(command.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Links `src` into the working tree (symlink on Unix, copy elsewhere).
///
/// # Errors
/// Returns an error if the link/copy cannot be created.
#[cfg(unix)]
pub fn link_or_copy(src: &Path, dst: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dst)
        .with_context(|| format!("Failed to link {} as {}", src.display(), dst.display()))
}

/// Links `src` into the working tree (symlink on Unix, copy elsewhere).
///
/// # Errors
/// Returns an error if the link/copy cannot be created.
#[cfg(not(unix))]
pub fn link_or_copy(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_builds_working_tree() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("out");
        let work = WorkDir::create(&root).unwrap();

        for sub in ["bam", "logs", "cmds", "chunks", "chunks_bam", "polished_chunks"] {
            assert!(root.join(sub).is_dir(), "missing {sub}");
        }
        assert_eq!(work.root(), fs::canonicalize(&root).unwrap().as_path());
    }

    #[test]
    fn test_create_fails_on_collision() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("out");
        WorkDir::create(&root).unwrap();

        let err = WorkDir::create(&root).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_cmd_log_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("extract.cmds");
        let mut log = CmdLog::open(&path).unwrap();
        log.record("samtools view -b aln.bam").unwrap();
        log.record("samtools index aln.bam").unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("samtools index"));
    }

    #[test]
    fn test_command_line_rendering() {
        let mut command = Command::new("samtools");
        command.args(["view", "-b", "-o", "out.bam", "aln.bam"]);
        assert_eq!(command_line(&command), "samtools view -b -o out.bam aln.bam");
    }

    #[test]
    fn test_link_or_copy() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "payload").unwrap();
        let dst = dir.path().join("b.txt");
        link_or_copy(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "payload");
    }
}
