//! Progress reporting while waiting on a job.

use std::time::Duration;

use arnica_hal::{JobId, Progress};
use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates from [`JobEngine::wait_with_progress`](crate::JobEngine::wait_with_progress).
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first query.
    fn start(&self, _job_id: &JobId, _total: usize) {}

    /// Called after every successful query.
    fn update(&self, progress: Progress);

    /// Called once when the wait ends, whatever the outcome.
    fn finish(&self) {}
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&self, _progress: Progress) {}
}

/// Terminal progress bar counting finished circuits.
#[derive(Debug)]
pub struct ProgressBarReporter {
    bar: ProgressBar,
}

impl ProgressBarReporter {
    /// A bar drawn on stderr.
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// A bar that draws nowhere; for tests and non-interactive runs.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} {msg} [{bar:30}] {pos}/{len}")
        {
            bar.set_style(style);
        }
        Self { bar }
    }

    /// Circuits shown as finished.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Circuits in the batch.
    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressBarReporter {
    fn start(&self, job_id: &JobId, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message(format!("job {job_id}"));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn update(&self, progress: Progress) {
        self.bar.set_length(progress.total_count as u64);
        self.bar.set_position(progress.finished_count as u64);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_tracks_progress() {
        let reporter = ProgressBarReporter::hidden();
        reporter.start(&JobId::new("j"), 4);
        assert_eq!(reporter.length(), Some(4));
        reporter.update(Progress {
            finished_count: 3,
            total_count: 4,
        });
        assert_eq!(reporter.position(), 3);
        reporter.finish();
    }
}
