//! Input validation utilities
//!
//! Common validation for command-line parameters, file paths, and the
//! external tools the pipeline shells out to.

use crate::errors::{PolishError, Result};
use log::{info, warn};
use std::env;
use std::path::{Path, PathBuf};

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input genome", "BAM")
///
/// # Errors
/// Returns an error if the file does not exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(PolishError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Errors
/// Returns an error if the value is zero
pub fn validate_positive(value: usize, name: &str) -> Result<()> {
    if value == 0 {
        return Err(PolishError::InvalidParameter {
            parameter: name.to_string(),
            reason: "Must be positive (> 0), got: 0".to_string(),
        });
    }
    Ok(())
}

/// Search PATH for an executable by name.
///
/// Returns the first matching file, or `None` when the tool is not installed.
#[must_use]
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path).map(|dir| dir.join(tool)).find(|candidate| candidate.is_file())
}

/// Probe PATH for every tool the current run needs.
///
/// Each tool is logged as found or missing; all missing tools are reported
/// together so the user can fix their environment in one pass.
///
/// # Errors
/// Returns [`PolishError::MissingDependency`] naming every missing tool.
pub fn check_dependencies(tools: &[&str]) -> Result<()> {
    info!("Checking dependencies...");
    let mut missing = Vec::new();
    for tool in tools {
        match find_in_path(tool) {
            Some(path) => info!("  Found {tool} ({})", path.display()),
            None => {
                warn!("  {tool} not found");
                missing.push(*tool);
            }
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PolishError::MissingDependency { tool: missing.join(", ") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_file_exists_valid() {
        let temp_file = NamedTempFile::new().unwrap();
        validate_file_exists(temp_file.path(), "Test file").unwrap();
    }

    #[test]
    fn test_validate_file_exists_invalid() {
        let result = validate_file_exists("/nonexistent/genome.fasta", "Input genome");
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Input genome"));
        assert!(err_msg.contains("does not exist"));
    }

    #[test]
    fn test_validate_positive() {
        validate_positive(1, "jobs").unwrap();
        validate_positive(100, "jobs").unwrap();

        let result = validate_positive(0, "jobs");
        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Invalid parameter 'jobs'"));
    }

    #[test]
    fn test_find_in_path_existing_tool() {
        // `sh` is present on every platform we run tests on
        assert!(find_in_path("sh").is_some());
    }

    #[test]
    fn test_find_in_path_missing_tool() {
        assert!(find_in_path("definitely-not-a-real-tool-name").is_none());
    }

    #[test]
    fn test_check_dependencies_reports_all_missing() {
        let result = check_dependencies(&["sh", "no-such-tool-a", "no-such-tool-b"]);
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("no-such-tool-a"));
        assert!(err_msg.contains("no-such-tool-b"));
        assert!(!err_msg.contains("sh,"));
    }
}
