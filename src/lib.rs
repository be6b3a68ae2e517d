//! # playhead
//!
//! Download videos, read their metadata, pull still frames out of them, and
//! simulate playback sessions over them.
//!
//! `playhead` has no codec or container logic of its own. Metadata comes
//! from `ffprobe`, frames are written by `ffmpeg`, and downloads are plain
//! HTTP with `Range` resume. What the crate adds is the orchestration:
//! resumable chunked transfers with throttled progress, a metadata cache,
//! and a clock that moves playback trackers forward.
//!
//! ## Quick Start
//!
//! ### Download with Resume
//!
//! ```no_run
//! use playhead::{DownloadRequest, HttpDownloader, VideoDownloader};
//!
//! let request = DownloadRequest::new("https://example.com/video.mp4", "video.mp4").unwrap();
//! let bytes = HttpDownloader::default().download(&request).unwrap();
//! ```
//!
//! ### Extract a Frame
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playhead::{FfmpegToolkit, FrameExtractor};
//!
//! let extractor = FrameExtractor::new(Arc::new(FfmpegToolkit::default()));
//! let frame = extractor
//!     .frame_at("video.mp4".as_ref(), 42.0, "frame.jpg".as_ref())
//!     .unwrap();
//! println!("{}x{} frame #{}", frame.width, frame.height, frame.frame_number);
//! ```
//!
//! ### Simulated Playback
//!
//! ```no_run
//! use playhead::SessionManager;
//!
//! let manager = SessionManager::with_defaults().unwrap();
//! let session = manager.start_session("video.mp4".as_ref()).unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(3));
//!
//! let now = manager.progress(session.video_id()).unwrap();
//! println!("{} / {}", now.formatted_current_time(), now.formatted_duration());
//! ```
//!
//! ## Features
//!
//! - **Resumable downloads**: `Range: bytes=N-` continuation, detection of
//!   servers that ignore it, throttled progress with a final 100 % report
//! - **Metadata**: duration, frame rate, resolution, codecs, and bit rates
//!   from `ffprobe` JSON, cached per file until its size changes
//! - **Frames**: single frames, fixed intervals, thumbnails, evenly spaced
//!   previews, and summaries
//! - **Playback sessions**: per-video trackers with seek, pause, resume, and
//!   a periodic clock, plus listener callbacks
//! - **Validation**: reports on files that cannot drive a session
//! - **Progress & cancellation**: `ProgressCallback` and `CancellationToken`
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `download_async` returning a `DownloadFuture` |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! `ffmpeg` and `ffprobe` must be on `PATH`, or pointed to by the
//! `PLAYHEAD_FFMPEG` and `PLAYHEAD_FFPROBE` environment variables.

pub mod config;
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod frames;
pub mod metadata;
pub mod playback;
pub mod probe;
pub mod progress;
pub mod session;
#[cfg(feature = "async")]
pub mod stream;
pub mod thumbnail;
mod utilities;
pub mod validation;

pub use config::{DownloadOptions, FrameOptions, ImageFormat, SessionOptions, ToolOptions};
pub use download::{DownloadRequest, DownloadRequestBuilder, HttpDownloader, VideoDownloader};
pub use error::{ErrorKind, PlayheadError};
pub use ffmpeg::{FfmpegToolkit, MediaToolkit};
pub use frames::FrameExtractor;
pub use metadata::{VideoFrame, VideoMetadata};
pub use playback::{TickOutcome, VideoId, VideoProgress};
pub use probe::MetadataCache;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use session::{DownloadProgress, PlaybackListener, SessionManager};
#[cfg(feature = "async")]
pub use stream::{DownloadFuture, download_async};
pub use thumbnail::{ThumbnailHandle, VideoSummary};
pub use validation::{ValidationReport, validate_metadata};
