//! Run progress events and the final report.

use std::fmt;
use std::path::PathBuf;

/// Progress notification from the control loop.
///
/// Events are delivered on the thread that called
/// [`BatchRunner::run_with`](crate::BatchRunner::run_with), in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// The worker pool is up.
    Started {
        /// Number of targets.
        items: usize,
        /// Worker slots.
        pool_size: usize,
        /// Rayon threads per worker.
        nested_threads: usize,
    },
    /// A target was opened.
    Opened {
        /// Target path.
        path: PathBuf,
        /// Sub-images queued.
        images: usize,
    },
    /// A target was skipped.
    Skipped {
        /// Target path.
        path: PathBuf,
        /// Skip cause.
        reason: String,
    },
    /// A sub-image was handed to a worker.
    TaskStarted {
        /// Target path.
        path: PathBuf,
        /// Sub-image index.
        index: usize,
        /// Worker slot.
        slot: usize,
        /// Tasks running including this one.
        running: usize,
    },
    /// A sub-image was corrected and written.
    Written {
        /// Target path.
        path: PathBuf,
        /// Sub-image index.
        index: usize,
        /// Output path.
        output: PathBuf,
        /// Corrected samples.
        corrected: usize,
    },
    /// A sub-image failed; nothing was written for it.
    TaskFailed {
        /// Target path.
        path: PathBuf,
        /// Sub-image index.
        index: usize,
        /// Failure cause.
        reason: String,
    },
    /// Cancellation was observed; running tasks are being drained.
    Aborting {
        /// Tasks still running.
        running: usize,
    },
}

/// Receives [`BatchEvent`]s.
pub trait BatchObserver {
    /// Called once per event.
    fn on_event(&mut self, event: &BatchEvent);
}

impl<F: FnMut(&BatchEvent)> BatchObserver for F {
    fn on_event(&mut self, event: &BatchEvent) {
        self(event)
    }
}

/// Outcome of a batch run.
///
/// Every target ends in exactly one of `succeeded`, `skipped` or `canceled`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Targets whose sub-images were all written.
    pub succeeded: usize,
    /// Targets that were disabled, unreadable, mismatched or failed.
    pub skipped: usize,
    /// Targets left unfinished by cancellation.
    pub canceled: usize,
    /// Corrected samples over all written outputs.
    pub corrected_pixels: u64,
    /// Written files in completion order.
    pub outputs: Vec<PathBuf>,
    /// Worker slots used.
    pub pool_size: usize,
    /// Most tasks observed running at once.
    pub peak_running: usize,
}

impl BatchReport {
    /// Total number of targets.
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.canceled
    }

    /// Returns `true` if every target was written.
    pub fn is_complete(&self) -> bool {
        self.skipped == 0 && self.canceled == 0
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "===== cosmetic: {} succeeded, {} skipped, {} canceled =====",
            self.succeeded, self.skipped, self.canceled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let r = BatchReport {
            succeeded: 3,
            skipped: 1,
            canceled: 0,
            ..Default::default()
        };
        assert_eq!(r.to_string(), "===== cosmetic: 3 succeeded, 1 skipped, 0 canceled =====");
        assert_eq!(r.total(), 4);
        assert!(!r.is_complete());
    }

    #[test]
    fn test_closure_observer() {
        let mut seen = 0;
        {
            let mut obs = |_: &BatchEvent| seen += 1;
            obs.on_event(&BatchEvent::Aborting { running: 0 });
            obs.on_event(&BatchEvent::Aborting { running: 1 });
        }
        assert_eq!(seen, 2);
    }
}
