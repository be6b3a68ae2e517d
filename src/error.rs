//! Error types for the `playhead` crate.
//!
//! This module defines [`PlayheadError`], the unified error type returned by
//! all fallible operations in the crate, and [`ErrorKind`], a coarse
//! classification that lets callers tell a missing playback session apart
//! from a broken download or an unreadable file.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::playback::VideoId;

/// The unified error type for all `playhead` operations.
///
/// Every public method that can fail returns `Result<T, PlayheadError>`.
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayheadError {
    /// A download request was malformed (blank URL, missing destination,
    /// unsupported scheme).
    #[error("Invalid download request: {0}")]
    InvalidRequest(String),

    /// A timestamp was negative, NaN, or beyond the video duration.
    #[error("Invalid timestamp: {0}s")]
    InvalidTimestamp(f64),

    /// An interval or count of zero was provided.
    #[error("Interval must be greater than zero")]
    InvalidInterval,

    /// Frame quality outside of the accepted 1–100 scale.
    #[error("Invalid frame quality {0} (expected 1-100)")]
    InvalidQuality(u8),

    /// The server answered with a status other than 200 or 206.
    #[error("Server returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The connection could not be established, timed out, or dropped.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// The probe tool could not read the file.
    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed {
        /// File that was probed.
        path: PathBuf,
        /// Tool output or failure reason.
        reason: String,
    },

    /// The probe output could not be parsed.
    #[error("Malformed probe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    /// The file does not contain a video stream.
    #[error("No video stream found in {path}")]
    NoVideoStream {
        /// File that was probed.
        path: PathBuf,
    },

    /// The extraction tool failed to produce an image.
    #[error("Failed to extract frame from {path}: {reason}")]
    ExtractionFailed {
        /// Source video.
        path: PathBuf,
        /// Tool output or failure reason.
        reason: String,
    },

    /// An external tool binary could not be started.
    #[error("External tool not found: {tool}")]
    ToolNotFound {
        /// Binary name or path.
        tool: String,
    },

    /// An external tool ran longer than the configured timeout and was killed.
    #[error("{tool} timed out after {timeout:?}")]
    ToolTimeout {
        /// Binary name or path.
        tool: String,
        /// Configured limit.
        timeout: Duration,
    },

    /// No playback session is registered under the identifier.
    #[error("No active playback session for video: {0}")]
    NoActiveSession(VideoId),

    /// A tracker has no usable duration, so it cannot advance.
    #[error("Tracker {0} has no duration metadata")]
    TrackerMissingMetadata(VideoId),

    /// The session manager was shut down and accepts no new sessions.
    #[error("Session manager has been shut down")]
    ManagerShutDown,

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse classification of a [`PlayheadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input, rejected before any I/O.
    Validation,
    /// Network or file transfer failure. Partial downloads are kept.
    Transport,
    /// The probe tool could not read the file.
    Probe,
    /// The extraction tool failed.
    Extraction,
    /// The operation targeted a session that does not exist or cannot run.
    SessionState,
    /// Cancelled by the caller.
    Cancelled,
}

impl PlayheadError {
    /// Classify this error.
    ///
    /// # Example
    ///
    /// ```
    /// use playhead::{ErrorKind, PlayheadError, VideoId};
    ///
    /// let error = PlayheadError::NoActiveSession(VideoId::new("missing"));
    /// assert_eq!(error.kind(), ErrorKind::SessionState);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayheadError::InvalidRequest(_)
            | PlayheadError::InvalidTimestamp(_)
            | PlayheadError::InvalidInterval
            | PlayheadError::InvalidQuality(_) => ErrorKind::Validation,
            PlayheadError::HttpStatus { .. }
            | PlayheadError::Transport(_)
            | PlayheadError::IoError(_) => ErrorKind::Transport,
            PlayheadError::ProbeFailed { .. }
            | PlayheadError::ProbeOutput(_)
            | PlayheadError::NoVideoStream { .. } => ErrorKind::Probe,
            PlayheadError::ExtractionFailed { .. }
            | PlayheadError::ToolNotFound { .. }
            | PlayheadError::ToolTimeout { .. } => ErrorKind::Extraction,
            PlayheadError::NoActiveSession(_)
            | PlayheadError::TrackerMissingMetadata(_)
            | PlayheadError::ManagerShutDown => ErrorKind::SessionState,
            PlayheadError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<ureq::Error> for PlayheadError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Status(status, response) => PlayheadError::HttpStatus {
                status,
                url: response.get_url().to_string(),
            },
            ureq::Error::Transport(transport) => PlayheadError::Transport(transport.to_string()),
        }
    }
}
