//! Sanity checks over probed metadata.
//!
//! [`VideoMetadata::validate`] returns a [`ValidationReport`] that says
//! whether a file can drive a playback session and frame extraction.
//!
//! # Example
//!
//! ```no_run
//! use playhead::{FfmpegToolkit, MediaToolkit};
//!
//! let metadata = FfmpegToolkit::default().probe("input.mp4".as_ref())?;
//! let report = metadata.validate();
//! if !report.is_valid() {
//!     for error in &report.errors {
//!         eprintln!("error: {error}");
//!     }
//! }
//! # Ok::<(), playhead::PlayheadError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::metadata::VideoMetadata;

const HIGH_FRAME_RATE: f64 = 240.0;

/// Result of validating one video.
///
/// Contains informational notices, warnings, and errors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Informational notices (not problems).
    pub info: Vec<String>,
    /// Issues that degrade playback or extraction but do not prevent it.
    pub warnings: Vec<String>,
    /// Issues that prevent playback or extraction.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns `true` if no errors were found. Warnings do not count.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of entries (info + warnings + errors).
    pub fn issue_count(&self) -> usize {
        self.info.len() + self.warnings.len() + self.errors.len()
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for item in &self.info {
            writeln!(f, "[INFO] {item}")?;
        }
        for item in &self.warnings {
            writeln!(f, "[WARN] {item}")?;
        }
        for item in &self.errors {
            writeln!(f, "[ERROR] {item}")?;
        }
        if self.issue_count() == 0 {
            writeln!(f, "No issues found.")?;
        }
        Ok(())
    }
}

impl VideoMetadata {
    /// Run [`validate_metadata`] on this metadata.
    pub fn validate(&self) -> ValidationReport {
        validate_metadata(self)
    }
}

/// Check duration, dimensions, frame rate, audio, and bit rates.
pub fn validate_metadata(metadata: &VideoMetadata) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !metadata.format.is_empty() {
        report.info.push(format!(
            "Container: {} ({})",
            metadata.format,
            metadata.formatted_file_size()
        ));
    }

    // ── Duration ───────────────────────────────────────────────────
    if metadata.duration_seconds <= 0.0 {
        report
            .errors
            .push("Duration is zero; playback sessions cannot advance".to_string());
    }

    // ── Video ──────────────────────────────────────────────────────
    if metadata.width == 0 || metadata.height == 0 {
        report.errors.push(format!(
            "Invalid video dimensions: {}",
            metadata.resolution()
        ));
    }

    if metadata.frame_rate <= 0.0 {
        report
            .errors
            .push("Frame rate is zero; frame numbers cannot be computed".to_string());
    } else if metadata.frame_rate > HIGH_FRAME_RATE {
        report.warnings.push(format!(
            "Unusually high frame rate ({:.1} fps)",
            metadata.frame_rate
        ));
    }

    if metadata.video_bitrate == 0 {
        report
            .warnings
            .push("Video bit rate is not reported".to_string());
    }

    if metadata.file_size_bytes == 0 {
        report.warnings.push("File is empty".to_string());
    }

    report.info.push(format!(
        "Video: {} {} @ {:.2} fps, {} frames, {}",
        metadata.video_codec,
        metadata.resolution(),
        metadata.frame_rate,
        metadata.total_frames(),
        metadata.formatted_duration()
    ));

    // ── Audio ──────────────────────────────────────────────────────
    match &metadata.audio_codec {
        Some(codec) => report.info.push(format!(
            "Audio: {} at {} kb/s",
            codec,
            metadata.audio_bitrate / 1000
        )),
        None => report.warnings.push("No audio stream".to_string()),
    }

    report
}
