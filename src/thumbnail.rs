//! Thumbnails, preview strips, and video summaries.
//!
//! These build on [`FrameExtractor`] with fixed placement rules: a
//! thumbnail sits at 10 % of the duration, and `n` previews are spread
//! evenly so that none lands on the first or last frame.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::config::{FrameOptions, ImageFormat};
use crate::error::PlayheadError;
use crate::frames::FrameExtractor;
use crate::metadata::{VideoFrame, VideoMetadata};

/// JPEG quality used for thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 85;
/// JPEG quality used for preview frames.
pub const PREVIEW_QUALITY: u8 = 80;
/// Number of preview frames in a [`VideoSummary`].
pub const SUMMARY_PREVIEW_COUNT: usize = 5;

/// The thumbnail sits at `duration / THUMBNAIL_DIVISOR`.
const THUMBNAIL_DIVISOR: f64 = 10.0;

/// A thumbnail plus evenly spaced previews of one video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    /// Probed metadata of the summarised video.
    pub metadata: VideoMetadata,
    /// Thumbnail at 10 % of the duration.
    pub thumbnail: VideoFrame,
    /// Preview frames in playback order.
    pub preview_frames: Vec<VideoFrame>,
    /// When the summary was built.
    pub created_at: DateTime<Local>,
}

impl VideoSummary {
    /// Number of preview frames.
    pub fn total_preview_frames(&self) -> usize {
        self.preview_frames.len()
    }

    /// One-line description, e.g.
    /// `Video: clip.mp4, Duration: 00:05:00, Resolution: 1920x1080, 5 preview frames`.
    pub fn summary_info(&self) -> String {
        let filename = self
            .metadata
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.metadata.path.display().to_string());
        format!(
            "Video: {}, Duration: {}, Resolution: {}, {} preview frames",
            filename,
            self.metadata.formatted_duration(),
            self.metadata.resolution(),
            self.total_preview_frames()
        )
    }
}

/// Thumbnail generation.
///
/// All methods are stateless functions over a [`FrameExtractor`] and the
/// already probed metadata of the video.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use playhead::{FfmpegToolkit, FrameExtractor, ThumbnailHandle};
///
/// let extractor = FrameExtractor::new(Arc::new(FfmpegToolkit::default()));
/// let metadata = extractor.probe("input.mp4".as_ref())?;
///
/// let thumb = ThumbnailHandle::thumbnail(&extractor, &metadata, "thumb.jpg".as_ref())?;
/// let previews = ThumbnailHandle::previews(&extractor, &metadata, "previews".as_ref(), 8)?;
/// println!("{} + {} previews", thumb.path.display(), previews.len());
/// # Ok::<(), playhead::PlayheadError>(())
/// ```
pub struct ThumbnailHandle;

impl ThumbnailHandle {
    /// Write a JPEG thumbnail (quality 85) taken at 10 % of the duration.
    pub fn thumbnail(
        extractor: &FrameExtractor,
        metadata: &VideoMetadata,
        output: &Path,
    ) -> Result<VideoFrame, PlayheadError> {
        let timestamp = metadata.duration_seconds / THUMBNAIL_DIVISOR;
        log::debug!(
            "Generating thumbnail for {} at {:.2}s",
            metadata.path.display(),
            timestamp
        );
        extractor.frame_with_metadata(
            &video_id(metadata),
            metadata,
            timestamp,
            output,
            &jpeg(THUMBNAIL_QUALITY),
        )
    }

    /// Write `count` JPEG previews (quality 80) into `directory`.
    ///
    /// Preview `i` (1-based) is taken at `duration / (count + 1) × i` and
    /// named `preview_{i:02}.jpg`.
    ///
    /// # Errors
    ///
    /// [`PlayheadError::InvalidInterval`] when `count` is zero.
    pub fn previews(
        extractor: &FrameExtractor,
        metadata: &VideoMetadata,
        directory: &Path,
        count: usize,
    ) -> Result<Vec<VideoFrame>, PlayheadError> {
        if count == 0 {
            return Err(PlayheadError::InvalidInterval);
        }
        fs::create_dir_all(directory)?;

        let spacing = metadata.duration_seconds / (count + 1) as f64;
        let id = video_id(metadata);
        let options = jpeg(PREVIEW_QUALITY);

        (1..=count)
            .map(|index| {
                let output = directory.join(format!("preview_{index:02}.jpg"));
                extractor.frame_with_metadata(
                    &id,
                    metadata,
                    spacing * index as f64,
                    &output,
                    &options,
                )
            })
            .collect()
    }

    /// Write `thumbnail.jpg` and five previews under `directory/previews`.
    pub fn summary(
        extractor: &FrameExtractor,
        metadata: &VideoMetadata,
        directory: &Path,
    ) -> Result<VideoSummary, PlayheadError> {
        fs::create_dir_all(directory)?;
        let thumbnail = Self::thumbnail(extractor, metadata, &thumbnail_path(directory))?;
        let preview_frames = Self::previews(
            extractor,
            metadata,
            &directory.join("previews"),
            SUMMARY_PREVIEW_COUNT,
        )?;

        log::info!(
            "Created summary of {} in {}",
            metadata.path.display(),
            directory.display()
        );
        Ok(VideoSummary {
            metadata: metadata.clone(),
            thumbnail,
            preview_frames,
            created_at: Local::now(),
        })
    }
}

fn thumbnail_path(directory: &Path) -> PathBuf {
    directory.join(format!("thumbnail.{}", ImageFormat::Jpeg.extension()))
}

fn jpeg(quality: u8) -> FrameOptions {
    FrameOptions::new()
        .with_format(ImageFormat::Jpeg)
        .with_quality(quality)
}

fn video_id(metadata: &VideoMetadata) -> String {
    metadata.path.to_string_lossy().into_owned()
}
