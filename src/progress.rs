//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring downloads and
//! frame extraction, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for detailed progress snapshots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playhead::{
//!     DownloadOptions, DownloadRequest, HttpDownloader, PlayheadError,
//!     ProgressCallback, ProgressInfo, VideoDownloader,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let request = DownloadRequest::builder()
//!     .url("https://example.com/video.mp4")
//!     .destination("target/video.mp4")
//!     .build()?;
//! let options = DownloadOptions::new().with_progress(Arc::new(PrintProgress));
//! let bytes = HttpDownloader::new(options).download(&request)?;
//! # Ok::<(), PlayheadError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Downloading a video over HTTP.
    Download,
    /// Extracting a sequence of frames.
    FrameExtraction,
}

/// A snapshot of operation progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// Units processed so far (bytes for downloads, frames otherwise).
    ///
    /// For resumed downloads this includes the bytes already on disk.
    pub current: u64,
    /// Total units expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    ///
    /// Successive reports of one operation never decrease, and the final
    /// report of a completed operation is exactly 100.0.
    pub percentage: Option<f64>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on throughput of this run.
    pub estimated_remaining: Option<Duration>,
}

/// Trait for receiving progress updates.
///
/// Implementations must be [`Send`] and [`Sync`] because callbacks may be
/// invoked from worker threads.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called at regular intervals during an operation.
    fn on_progress(&self, info: &ProgressInfo);
}

impl<F> ProgressCallback for F
where
    F: Fn(&ProgressInfo) + Send + Sync,
{
    fn on_progress(&self, info: &ProgressInfo) {
        self(info)
    }
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call [`cancel`](CancellationToken::cancel)
/// from any thread to request cancellation of the associated operation.
///
/// # Example
///
/// ```
/// use playhead::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that tracks progress timing and emits throttled callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    initial: u64,
    current: u64,
    interval: Duration,
    start_time: Instant,
    last_report: Instant,
    last_percentage: f64,
}

impl ProgressTracker {
    /// Create a new tracker starting at `initial` units.
    ///
    /// Reports are spaced at least `interval` apart; a zero interval reports
    /// on every advance.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        initial: u64,
        interval: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            callback,
            operation,
            total,
            initial,
            current: initial,
            interval,
            start_time: now,
            last_report: now,
            last_percentage: 0.0,
        }
    }

    /// Record `amount` completed units and fire the callback if the
    /// reporting interval has elapsed.
    pub(crate) fn advance_by(&mut self, amount: u64) {
        self.current = self.current.saturating_add(amount);

        if self.interval.is_zero() || self.last_report.elapsed() > self.interval {
            let percentage = self.percentage();
            self.report(percentage);
            self.last_report = Instant::now();
        }
    }

    /// Record one completed unit.
    pub(crate) fn advance(&mut self) {
        self.advance_by(1);
    }

    /// Unconditionally emit a final 100 % report.
    pub(crate) fn finish(&mut self) {
        self.report(Some(100.0));
    }

    /// Extrapolate from the units processed since the tracker started.
    fn estimate_remaining(&self, elapsed: Duration) -> Option<Duration> {
        let processed = self.current.saturating_sub(self.initial);
        let total = self.total?;
        if processed == 0 {
            return None;
        }
        let per_unit = elapsed.as_secs_f64() / processed as f64;
        let remaining = total.saturating_sub(self.current) as f64;
        Some(Duration::from_secs_f64(per_unit * remaining))
    }

    fn percentage(&self) -> Option<f64> {
        self.total.filter(|&total| total > 0).map(|total| {
            let raw = (self.current as f64 / total as f64) * 100.0;
            raw.clamp(0.0, 100.0).max(self.last_percentage)
        })
    }

    fn report(&mut self, percentage: Option<f64>) {
        let elapsed = self.start_time.elapsed();

        if let Some(pct) = percentage {
            self.last_percentage = pct;
        }

        let estimated_remaining = match percentage {
            Some(pct) if pct >= 100.0 => Some(Duration::ZERO),
            Some(_) => self.estimate_remaining(elapsed),
            None => None,
        };

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
        };

        self.callback.on_progress(&info);
    }
}
