//! Progress reporting and run results.

use std::time::Duration;

use humansize::{BINARY, format_size};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Full scale of a progress value.
pub const PROGRESS_SCALE: u32 = 1000;

/// Minimum delay between progress reports from inside a transfer.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Progress of the current operation and of the whole script, both on the
/// `0..=PROGRESS_SCALE` scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub operation: u32,
    pub summary: u32,
}

impl Progress {
    pub fn new(operation: u32, summary: u32) -> Self {
        Self {
            operation: operation.min(PROGRESS_SCALE),
            summary: summary.min(PROGRESS_SCALE),
        }
    }

    /// Scale `done / total` to `0..=PROGRESS_SCALE`. An empty total is complete.
    pub fn ratio(done: u64, total: u64) -> u32 {
        if total == 0 {
            return PROGRESS_SCALE;
        }
        let scaled = u128::from(done.min(total)) * u128::from(PROGRESS_SCALE) / u128::from(total);
        scaled as u32
    }

    /// Get the summary progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        f64::from(self.summary) / 10.0
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// Every operation finished, possibly with some skipped.
    Done,
    /// At least one operation failed, or the script was not runnable.
    Failed,
    /// Cancellation stopped the run.
    Cancelled,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: WorkerOutcome,
    /// Operations that finished.
    pub done: usize,
    /// Operations skipped on request.
    pub skipped: usize,
    /// Operations abandoned after an error.
    pub failed: usize,
    /// Operations that never finished because the run was cancelled.
    pub cancelled: usize,
    /// File content bytes written.
    pub bytes_transferred: u64,
    /// Progress weight of all finished operations.
    pub weight_done: u64,
}

impl RunSummary {
    pub(crate) fn empty(outcome: WorkerOutcome) -> Self {
        Self {
            outcome,
            done: 0,
            skipped: 0,
            failed: 0,
            cancelled: 0,
            bytes_transferred: 0,
            weight_done: 0,
        }
    }

    /// Check if the run was fully successful.
    pub fn is_success(&self) -> bool {
        self.outcome == WorkerOutcome::Done
    }

    /// Get a human-readable summary of the run.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{}: {} done, {} skipped, {} failed",
            self.outcome, self.done, self.skipped, self.failed
        );
        if self.cancelled > 0 {
            text.push_str(&format!(", {} cancelled", self.cancelled));
        }
        text.push_str(&format!(
            " ({} transferred)",
            format_size(self.bytes_transferred, BINARY)
        ));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(Progress::ratio(0, 10), 0);
        assert_eq!(Progress::ratio(5, 10), 500);
        assert_eq!(Progress::ratio(10, 10), 1000);
        assert_eq!(Progress::ratio(20, 10), 1000);
        assert_eq!(Progress::ratio(0, 0), 1000);
        assert_eq!(Progress::ratio(u64::MAX / 2, u64::MAX), 499);
    }

    #[test]
    fn test_progress_is_clamped() {
        let progress = Progress::new(5000, 250);
        assert_eq!(progress.operation, PROGRESS_SCALE);
        assert_eq!(progress.percentage(), 25.0);
    }

    #[test]
    fn test_summary_text() {
        let mut summary = RunSummary::empty(WorkerOutcome::Cancelled);
        summary.done = 2;
        summary.cancelled = 1;
        summary.bytes_transferred = 2048;

        let text = summary.summary();
        assert!(text.starts_with("Cancelled: 2 done"));
        assert!(text.contains("1 cancelled"));
        assert!(text.contains("2 KiB"));
        assert!(!summary.is_success());
    }
}
