//! Custom error types for asmpolish operations.

use thiserror::Error;

/// Result type alias for asmpolish operations
pub type Result<T> = std::result::Result<T, PolishError>;

/// Error type for asmpolish operations
#[derive(Error, Debug)]
pub enum PolishError {
    /// A required external tool could not be found in PATH
    #[error("Required tool(s) not found in PATH: {tool}")]
    MissingDependency {
        /// The missing tool name(s)
        tool: String,
    },

    /// The target output directory already exists
    #[error("Output directory '{path}' already exists, please erase it before launching")]
    OutputDirExists {
        /// Path of the colliding directory
        path: String,
    },

    /// Invalid parameter value provided
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// The parameter name
        parameter: String,
        /// Explanation of why it's invalid
        reason: String,
    },

    /// File format error
    #[error("Invalid {file_type} file '{path}': {reason}")]
    InvalidFileFormat {
        /// Type of file (e.g., "FASTA", "BAM")
        file_type: String,
        /// Path to the file
        path: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Sequence identifiers contain characters the alignment toolkit cannot handle
    #[error(
        "Sequence identifiers in '{path}' contain characters outside [A-Za-z0-9_-]; \
         remove them before supplying a pre-made BAM, or let the pipeline run the mapping itself"
    )]
    InvalidIdentifiers {
        /// Path of the offending FASTA file
        path: String,
    },

    /// An external command exited with a non-zero status
    #[error("External command failed with exit code {code}: {command}")]
    CommandFailed {
        /// The full command line
        command: String,
        /// The exit code (-1 when killed by a signal)
        code: i32,
    },

    /// One or more polishing jobs failed after the batch drained
    #[error("{failed} of {total} polishing job(s) failed")]
    JobsFailed {
        /// Number of failed jobs
        failed: usize,
        /// Total number of jobs launched
        total: usize,
    },
}
