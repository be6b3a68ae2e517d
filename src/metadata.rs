//! Video metadata types.
//!
//! [`VideoMetadata`] is an immutable snapshot produced by probing a file
//! with the external probe tool. [`VideoFrame`] describes one image written
//! by the extraction tool.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::utilities;

/// Metadata for one video file.
///
/// Describes the first video stream and, if present, the first audio
/// stream, plus container-level information.
///
/// # Example
///
/// ```no_run
/// use playhead::{FfmpegToolkit, MediaToolkit};
///
/// let metadata = FfmpegToolkit::default().probe("input.mp4".as_ref())?;
/// println!("{} @ {:.2} fps, {}", metadata.resolution(), metadata.frame_rate,
///     metadata.formatted_duration());
/// # Ok::<(), playhead::PlayheadError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[must_use]
pub struct VideoMetadata {
    /// Probed file.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration_seconds: f64,
    /// Frames per second of the first video stream.
    pub frame_rate: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Video codec name (e.g. `"h264"`).
    pub video_codec: String,
    /// Audio codec name, if the file has an audio stream.
    pub audio_codec: Option<String>,
    /// Video bit rate in bits per second (0 when unknown).
    pub video_bitrate: u64,
    /// Audio bit rate in bits per second (0 when unknown or absent).
    pub audio_bitrate: u64,
    /// File size in bytes at probe time.
    pub file_size_bytes: u64,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// When the probe ran.
    pub extracted_at: DateTime<Local>,
}

impl VideoMetadata {
    /// Total frame count, `round(duration × frame_rate)`.
    pub fn total_frames(&self) -> u64 {
        if self.duration_seconds <= 0.0 {
            return 0;
        }
        utilities::timestamp_to_frame_number(self.duration_seconds, self.frame_rate)
    }

    /// Duration as `HH:MM:SS`.
    ///
    /// ```
    /// # use playhead::VideoMetadata;
    /// # fn check(mut metadata: VideoMetadata) {
    /// metadata.duration_seconds = 7323.0;
    /// assert_eq!(metadata.formatted_duration(), "02:02:03");
    /// # }
    /// ```
    pub fn formatted_duration(&self) -> String {
        utilities::format_hms(self.duration_seconds)
    }

    /// Resolution as `WIDTHxHEIGHT`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// File size with one decimal in B / KB / MB / GB.
    pub fn formatted_file_size(&self) -> String {
        utilities::format_file_size(self.file_size_bytes)
    }

    /// Whether the file carries an audio stream.
    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// One frame image written by the extraction tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[must_use]
pub struct VideoFrame {
    /// Identifier of the source video (its path, or a session identifier).
    pub video_id: String,
    /// Frame index, `round(timestamp × frame_rate)`.
    pub frame_number: u64,
    /// Position in the source video, in seconds.
    pub timestamp_seconds: f64,
    /// Written image file.
    pub path: PathBuf,
    /// Image format extension (e.g. `"jpg"`).
    pub format: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Size of the written image in bytes.
    pub file_size_bytes: u64,
    /// When the frame was written.
    pub extracted_at: DateTime<Local>,
    /// Requested quality on the 1–100 scale.
    pub quality: u8,
}

impl VideoFrame {
    /// Timestamp as `HH:MM:SS.mmm`.
    pub fn formatted_timestamp(&self) -> String {
        utilities::format_hms_millis(self.timestamp_seconds)
    }

    /// File name of the image, without directories.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Image size with one decimal in B / KB / MB.
    pub fn formatted_file_size(&self) -> String {
        utilities::format_file_size(self.file_size_bytes)
    }

    /// The image location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
