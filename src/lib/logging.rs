//! Logging helpers for stage timing and formatted output.

use std::time::{Duration, Instant};

/// Formats a duration in human-readable form.
///
/// # Examples
///
/// ```
/// use asmpolish_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(45)), "45s");
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// assert_eq!(format_duration(Duration::from_secs(5400)), "1h 30m");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 { format!("{mins}m") } else { format!("{mins}m {remaining_secs}s") }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 { format!("{hours}h") } else { format!("{hours}h {mins}m") }
    }
}

/// Stage timing helper.
///
/// Logs the start of a pipeline stage on construction and a timed completion
/// message on [`OperationTimer::done`].
///
/// # Examples
///
/// ```no_run
/// use asmpolish_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Fragmenting the genome");
/// // ... do work ...
/// timer.done();
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new timer and logs the stage start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation}...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the stage completion with elapsed time.
    pub fn done(&self) {
        log::info!("{} done in {}", self.operation, format_duration(self.start_time.elapsed()));
    }

    /// Logs the stage completion with elapsed time and an item count.
    pub fn done_with_count(&self, count: usize, noun: &str) {
        log::info!(
            "{} done in {} ({count} {noun})",
            self.operation,
            format_duration(self.start_time.elapsed())
        );
    }
}
