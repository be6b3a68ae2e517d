//! Operational configuration.
//!
//! [`DownloadOptions`] threads timeouts, buffer sizing, progress callbacks,
//! and cancellation tokens through the downloader without polluting every
//! function signature. [`FrameOptions`] controls image output of frame
//! extraction, [`ToolOptions`] locates the external `ffmpeg`/`ffprobe`
//! binaries, and [`SessionOptions`] tunes the playback clock.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use playhead::{CancellationToken, DownloadOptions, ProgressCallback, ProgressInfo};
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} bytes", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = DownloadOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_read_timeout(Duration::from_secs(30));
//! ```

use std::env;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PlayheadError;
use crate::progress::{CancellationToken, ProgressCallback};
use crate::utilities;

/// Default connect timeout for HTTP downloads.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(15_000);
/// Default read (idle) timeout for HTTP downloads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(60_000);
/// Default streaming buffer size (256 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;
/// Minimum wall-clock spacing between download progress callbacks.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
/// Default quality for single frame extraction.
pub const DEFAULT_FRAME_QUALITY: u8 = 90;

/// Configuration for HTTP downloads.
///
/// All fields have sensible defaults, so a default-constructed value
/// downloads with the standard timeouts and no progress reporting.
#[derive(Clone)]
pub struct DownloadOptions {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) buffer_size: usize,
    pub(crate) user_agent: String,
    pub(crate) progress_interval: Duration,
    /// `None` means no progress reporting at all, including the final 100 %.
    pub(crate) progress: Option<Arc<dyn ProgressCallback>>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for DownloadOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DownloadOptions")
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("buffer_size", &self.buffer_size)
            .field("user_agent", &self.user_agent)
            .field("progress_interval", &self.progress_interval)
            .field("has_progress", &self.progress.is_some())
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadOptions {
    /// Create options with the default timeouts (15 s connect, 60 s read),
    /// a 256 KiB buffer, and no progress callback.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            user_agent: format!("playhead/{}", env!("CARGO_PKG_VERSION")),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            progress: None,
            cancellation: None,
        }
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout. A stalled transfer fails once no byte has
    /// arrived for this long.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the streaming chunk size. Clamped to a minimum of 1 KiB.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1024);
        self
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Attach a progress callback.
    ///
    /// The callback fires at most once per
    /// [`progress_interval`](DownloadOptions::with_progress_interval), plus a
    /// final 100 % report when the transfer completes.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Set the minimum spacing between progress callbacks.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Attach a cancellation token, checked between chunks.
    ///
    /// A cancelled download returns
    /// [`PlayheadError::Cancelled`](crate::PlayheadError::Cancelled) and
    /// leaves the partial file in place for a later resume.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Configured connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Configured read timeout.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Configured chunk size.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Configured user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Image container for extracted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// JPEG. Quality is mapped to ffmpeg's `-q:v` scale.
    #[default]
    Jpeg,
    /// PNG (lossless; quality is recorded but not passed to ffmpeg).
    Png,
    /// BMP.
    Bmp,
    /// WebP, encoded with ffmpeg's `libwebp`.
    ///
    /// Many ffmpeg builds ship without `libwebp`; extraction then fails with
    /// [`PlayheadError::ExtractionFailed`] carrying ffmpeg's error output.
    /// `ffmpeg -encoders | grep webp` shows whether it is available.
    WebP,
}

impl ImageFormat {
    /// File extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Bmp => "bmp",
            ImageFormat::WebP => "webp",
        }
    }

    /// Parse a user-supplied extension (`"jpg"`, `".PNG"`, `"jpeg"`, ...).
    pub fn from_extension(value: &str) -> Option<Self> {
        match value.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "bmp" => Some(ImageFormat::Bmp),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// Output settings for frame extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Image format written by the extraction tool.
    pub format: ImageFormat,
    /// Visual quality on a 1–100 scale (100 best).
    pub quality: u8,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Jpeg,
            quality: DEFAULT_FRAME_QUALITY,
        }
    }
}

impl FrameOptions {
    /// JPEG at the default quality (90).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image format.
    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the quality. Validated when the frame is extracted.
    #[must_use]
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Quality translated to ffmpeg's `-q:v` scale.
    ///
    /// ```
    /// use playhead::FrameOptions;
    ///
    /// assert_eq!(FrameOptions::new().with_quality(100).native_quality(), 1);
    /// assert_eq!(FrameOptions::new().with_quality(90).native_quality(), 4);
    /// assert_eq!(FrameOptions::new().with_quality(1).native_quality(), 31);
    /// ```
    pub fn native_quality(&self) -> u8 {
        utilities::native_jpeg_quality(self.quality)
    }

    pub(crate) fn validate(&self) -> Result<(), PlayheadError> {
        if (1..=100).contains(&self.quality) {
            Ok(())
        } else {
            Err(PlayheadError::InvalidQuality(self.quality))
        }
    }
}

/// Locations and limits for the external `ffmpeg` / `ffprobe` binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOptions {
    /// Path or name of the `ffmpeg` binary.
    pub ffmpeg: PathBuf,
    /// Path or name of the `ffprobe` binary.
    pub ffprobe: PathBuf,
    /// Maximum wall-clock time for one tool invocation.
    pub timeout: Duration,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            timeout: Duration::from_secs(120),
        }
    }
}

impl ToolOptions {
    /// Defaults, resolved through `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `PLAYHEAD_FFMPEG` and `PLAYHEAD_FFPROBE`
    /// when those variables are set and non-empty.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(path) = env::var_os("PLAYHEAD_FFMPEG").filter(|value| !value.is_empty()) {
            options.ffmpeg = PathBuf::from(path);
        }
        if let Some(path) = env::var_os("PLAYHEAD_FFPROBE").filter(|value| !value.is_empty()) {
            options.ffprobe = PathBuf::from(path);
        }
        options
    }

    /// Set the `ffmpeg` binary.
    #[must_use]
    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = path.into();
        self
    }

    /// Set the `ffprobe` binary.
    #[must_use]
    pub fn with_ffprobe(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe = path.into();
        self
    }

    /// Set the per-invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Tuning for the [`SessionManager`](crate::SessionManager) playback clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    /// Wall-clock spacing between ticks.
    pub tick_interval: Duration,
    /// Simulated seconds added to each playing tracker per tick.
    pub tick_step_seconds: f64,
    /// How long [`shutdown`](crate::SessionManager::shutdown) waits for an
    /// in-flight tick before aborting the clock.
    pub shutdown_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            tick_step_seconds: 1.0,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl SessionOptions {
    /// One simulated second per wall-clock second, 5 s shutdown grace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick interval. Clamped to at least 1 ms.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Set the simulated step per tick.
    #[must_use]
    pub fn with_tick_step(mut self, seconds: f64) -> Self {
        self.tick_step_seconds = seconds;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}
