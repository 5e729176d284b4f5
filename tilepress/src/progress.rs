//! Progress reporting and cooperative cancellation of tile generation runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Receiver of progress information of a run.
///
/// Methods are called from render workers, so implementations must be thread safe. All methods
/// do nothing by default.
pub trait Feedback: Send + Sync {
    /// Overall progress in percent, `0.0..=100.0`.
    fn set_progress(&self, _percent: f64) {}
    /// Short description of the current state, e.g. `Generated: 5/20 metatiles`.
    fn set_progress_text(&self, _text: &str) {}
    /// Informational console line, e.g. `Generating tiles for zoom level: 3`.
    fn push_info(&self, _info: &str) {}
}

/// Feedback that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl Feedback for NoFeedback {}

/// Feedback that writes everything into the [`log`] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn set_progress(&self, percent: f64) {
        log::trace!("Progress: {percent:.1}%");
    }

    fn set_progress_text(&self, text: &str) {
        log::debug!("{text}");
    }

    fn push_info(&self, info: &str) {
        log::info!("{info}");
    }
}

/// Shared flag used to ask a running generation to stop.
///
/// Clones share the same flag. Cancellation is checked before every metatile is started, so the
/// metatiles already being rendered are finished and written.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new not canceled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    /// Returns true if cancellation was requested.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// Counter of completed metatiles of a run.
///
/// Incrementing and reporting happen under one lock, so reported values never go backwards.
pub struct ProgressTracker<'a> {
    total: u64,
    completed: Mutex<u64>,
    feedback: &'a dyn Feedback,
}

impl<'a> ProgressTracker<'a> {
    /// Creates a tracker for `total` metatiles.
    pub fn new(total: u64, feedback: &'a dyn Feedback) -> Self {
        Self {
            total,
            completed: Mutex::new(0),
            feedback,
        }
    }

    /// Number of completed metatiles.
    pub fn completed(&self) -> u64 {
        *self.completed.lock()
    }

    /// Counts one more completed metatile and reports the new state. Returns the new count.
    pub fn increment(&self) -> u64 {
        let mut completed = self.completed.lock();
        *completed += 1;

        let percent = if self.total == 0 {
            100.0
        } else {
            100.0 * *completed as f64 / self.total as f64
        };
        self.feedback.set_progress(percent);
        self.feedback
            .set_progress_text(&format!("Generated: {}/{} metatiles", *completed, self.total));

        *completed
    }
}
