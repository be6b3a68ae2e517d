//! Simulated playback state.
//!
//! A [`VideoProgress`] records where playback of one video currently is.
//! Only the position, duration, frame rate, and playing flag are stored;
//! percentage and frame index are computed on every call, so they can never
//! disagree with the position.
//!
//! # Example
//!
//! ```
//! use playhead::{TickOutcome, VideoProgress};
//!
//! let mut progress = VideoProgress::new("intro", "intro.mp4", 120.0, 30.0);
//! progress.seek(30.0);
//! assert_eq!(progress.progress_percentage(), 25.0);
//! assert_eq!(progress.current_frame(), 900);
//!
//! progress.resume();
//! assert_eq!(progress.tick(1.0)?, TickOutcome::Advanced);
//! assert_eq!(progress.current_time_seconds(), 31.0);
//! # Ok::<(), playhead::PlayheadError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::PlayheadError;
use crate::metadata::VideoMetadata;
use crate::utilities;

/// Opaque identifier of a playback session.
///
/// Usually derived from the source path with [`VideoId::from_path`], but any
/// string works; two sessions over the same file can coexist under
/// different identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Wrap an arbitrary identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier derived from a file path (lossy for non-UTF-8 paths).
    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VideoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VideoId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// What a single [`VideoProgress::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tracker is paused; nothing changed.
    Idle,
    /// The position moved forward and playback continues.
    Advanced,
    /// The position reached the end and playback stopped.
    Completed,
}

/// Playback position of one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoProgress {
    video_id: VideoId,
    source: PathBuf,
    current_time_seconds: f64,
    total_duration_seconds: f64,
    frame_rate: f64,
    last_updated: DateTime<Local>,
    playing: bool,
    width: u32,
    height: u32,
}

impl VideoProgress {
    /// Create a paused tracker at position 0.
    ///
    /// Negative or non-finite durations and frame rates are stored as 0.
    pub fn new(
        video_id: impl Into<VideoId>,
        source: impl Into<PathBuf>,
        total_duration_seconds: f64,
        frame_rate: f64,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            source: source.into(),
            current_time_seconds: 0.0,
            total_duration_seconds: sanitize(total_duration_seconds),
            frame_rate: sanitize(frame_rate),
            last_updated: Local::now(),
            playing: false,
            width: 0,
            height: 0,
        }
    }

    /// Create a paused tracker at position 0 from probed metadata.
    pub fn from_metadata(video_id: impl Into<VideoId>, metadata: &VideoMetadata) -> Self {
        Self::new(
            video_id,
            metadata.path.clone(),
            metadata.duration_seconds,
            metadata.frame_rate,
        )
        .with_dimensions(metadata.width, metadata.height)
    }

    /// Create a tracker whose metadata is not known yet, such as a file that
    /// is still downloading. It cannot advance until
    /// [`apply_metadata`](Self::apply_metadata) is called.
    pub fn pending(video_id: impl Into<VideoId>, source: impl Into<PathBuf>) -> Self {
        Self::new(video_id, source, 0.0, 0.0)
    }

    /// Set the frame dimensions.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Session identifier.
    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Video file the tracker plays.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Current position in seconds, always within `0..=duration`.
    pub fn current_time_seconds(&self) -> f64 {
        self.current_time_seconds
    }

    /// Duration in seconds (0 when unknown).
    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    /// Frames per second (0 when unknown).
    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Time of the last mutation.
    pub fn last_updated(&self) -> DateTime<Local> {
        self.last_updated
    }

    /// Whether the clock advances this tracker.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Position as a percentage of the duration, 0 when the duration is unknown.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_duration_seconds <= 0.0 {
            return 0.0;
        }
        (self.current_time_seconds / self.total_duration_seconds * 100.0).clamp(0.0, 100.0)
    }

    /// Index of the frame at the current position.
    pub fn current_frame(&self) -> u64 {
        utilities::timestamp_to_frame_number(self.current_time_seconds, self.frame_rate)
    }

    /// Number of frames in the whole video.
    pub fn total_frames(&self) -> u64 {
        utilities::timestamp_to_frame_number(self.total_duration_seconds, self.frame_rate)
    }

    /// Current position as `HH:MM:SS`.
    pub fn formatted_current_time(&self) -> String {
        utilities::format_hms(self.current_time_seconds)
    }

    /// Duration as `HH:MM:SS`.
    pub fn formatted_duration(&self) -> String {
        utilities::format_hms(self.total_duration_seconds)
    }

    /// Whether the position has reached a known end.
    pub fn is_finished(&self) -> bool {
        self.total_duration_seconds > 0.0
            && self.current_time_seconds >= self.total_duration_seconds
    }

    /// Move to `seconds`, clamped to `0..=duration`. NaN seeks to 0.
    ///
    /// Returns the previous position.
    pub fn seek(&mut self, seconds: f64) -> f64 {
        let previous = self.current_time_seconds;
        let target = if seconds.is_nan() { 0.0 } else { seconds };
        self.current_time_seconds = target.clamp(0.0, self.total_duration_seconds);
        self.touch();
        previous
    }

    /// Stop advancing on clock ticks.
    pub fn pause(&mut self) {
        self.playing = false;
        self.touch();
    }

    /// Advance on clock ticks again.
    pub fn resume(&mut self) {
        self.playing = true;
        self.touch();
    }

    /// Advance a playing tracker by `step_seconds`.
    ///
    /// Reaching or passing the end pins the position to the duration and
    /// pauses the tracker, after which further ticks are [`TickOutcome::Idle`].
    ///
    /// # Errors
    ///
    /// [`PlayheadError::TrackerMissingMetadata`] for a playing tracker whose
    /// duration is unknown.
    pub fn tick(&mut self, step_seconds: f64) -> Result<TickOutcome, PlayheadError> {
        if !self.playing {
            return Ok(TickOutcome::Idle);
        }
        if self.total_duration_seconds <= 0.0 {
            return Err(PlayheadError::TrackerMissingMetadata(self.video_id.clone()));
        }

        let next = self.current_time_seconds + sanitize(step_seconds);
        self.touch();
        if next >= self.total_duration_seconds {
            self.current_time_seconds = self.total_duration_seconds;
            self.playing = false;
            Ok(TickOutcome::Completed)
        } else {
            self.current_time_seconds = next;
            Ok(TickOutcome::Advanced)
        }
    }

    /// Fill in duration, frame rate, and dimensions once they are known,
    /// keeping the position within the new duration.
    pub fn apply_metadata(&mut self, metadata: &VideoMetadata) {
        self.total_duration_seconds = sanitize(metadata.duration_seconds);
        self.frame_rate = sanitize(metadata.frame_rate);
        self.width = metadata.width;
        self.height = metadata.height;
        self.current_time_seconds = self
            .current_time_seconds
            .clamp(0.0, self.total_duration_seconds);
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Local::now();
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
