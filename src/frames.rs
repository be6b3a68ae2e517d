//! Frame extraction.
//!
//! [`FrameExtractor`] turns a timestamp into a [`VideoFrame`]: it validates
//! the request against the video's metadata, asks the [`MediaToolkit`] to
//! write the image, and then records what was written.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playhead::{FfmpegToolkit, FrameExtractor, FrameOptions, ImageFormat};
//!
//! let extractor = FrameExtractor::new(Arc::new(FfmpegToolkit::default()));
//!
//! let frame = extractor.frame_at("input.mp4".as_ref(), 12.5, "frame.jpg".as_ref())?;
//! println!("frame {} at {}", frame.frame_number, frame.formatted_timestamp());
//!
//! let png = FrameOptions::new().with_format(ImageFormat::Png);
//! let frames = extractor.frames_at_intervals("input.mp4".as_ref(), 10.0, "frames".as_ref(), &png)?;
//! println!("{} frames written", frames.len());
//! # Ok::<(), playhead::PlayheadError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::config::FrameOptions;
use crate::error::PlayheadError;
use crate::ffmpeg::MediaToolkit;
use crate::metadata::{VideoFrame, VideoMetadata};
use crate::progress::{OperationType, ProgressCallback, ProgressTracker};
use crate::utilities;

/// Upper bound on the frames one interval run may write.
pub const MAX_INTERVAL_FRAMES: u64 = 100_000;

/// Writes frame images through a [`MediaToolkit`].
///
/// Cheap to clone; clones share the toolkit.
#[derive(Clone)]
pub struct FrameExtractor {
    toolkit: Arc<dyn MediaToolkit>,
}

impl Debug for FrameExtractor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameExtractor").finish_non_exhaustive()
    }
}

impl FrameExtractor {
    /// Create an extractor backed by `toolkit`.
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }

    /// The toolkit used for probing and extraction.
    pub fn toolkit(&self) -> &Arc<dyn MediaToolkit> {
        &self.toolkit
    }

    /// Probe `path` without caching.
    pub fn probe(&self, path: &Path) -> Result<VideoMetadata, PlayheadError> {
        self.toolkit.probe(path)
    }

    /// Probe `path` and write the frame at `timestamp_seconds` as a JPEG of
    /// the default quality.
    pub fn frame_at(
        &self,
        path: &Path,
        timestamp_seconds: f64,
        output: &Path,
    ) -> Result<VideoFrame, PlayheadError> {
        self.frame_at_with_options(path, timestamp_seconds, output, &FrameOptions::default())
    }

    /// Probe `path` and write the frame at `timestamp_seconds`.
    ///
    /// # Errors
    ///
    /// Probing errors, [`PlayheadError::InvalidTimestamp`] for a timestamp
    /// outside the video, [`PlayheadError::InvalidQuality`], or
    /// extraction errors.
    pub fn frame_at_with_options(
        &self,
        path: &Path,
        timestamp_seconds: f64,
        output: &Path,
        options: &FrameOptions,
    ) -> Result<VideoFrame, PlayheadError> {
        let metadata = self.toolkit.probe(path)?;
        let video_id = path.to_string_lossy();
        self.frame_with_metadata(&video_id, &metadata, timestamp_seconds, output, options)
    }

    /// Write the frame at `timestamp_seconds` of an already probed video.
    ///
    /// The timestamp must be finite, non-negative, and no later than the
    /// duration (when the duration is known). The frame dimensions are read
    /// back from the written image, falling back to the probed resolution
    /// for formats that cannot be decoded.
    pub fn frame_with_metadata(
        &self,
        video_id: &str,
        metadata: &VideoMetadata,
        timestamp_seconds: f64,
        output: &Path,
        options: &FrameOptions,
    ) -> Result<VideoFrame, PlayheadError> {
        options.validate()?;
        validate_timestamp(timestamp_seconds, metadata.duration_seconds)?;

        self.toolkit
            .extract_frame(&metadata.path, timestamp_seconds, output, options)?;

        let file_size_bytes = fs::metadata(output)?.len();
        let (width, height) =
            image::image_dimensions(output).unwrap_or((metadata.width, metadata.height));

        Ok(VideoFrame {
            video_id: video_id.to_string(),
            frame_number: utilities::timestamp_to_frame_number(
                timestamp_seconds,
                metadata.frame_rate,
            ),
            timestamp_seconds,
            path: output.to_path_buf(),
            format: options.format.extension().to_string(),
            width,
            height,
            file_size_bytes,
            extracted_at: Local::now(),
            quality: options.quality,
        })
    }

    /// Probe `path` and write one frame every `interval_seconds` into
    /// `directory`, starting at 0 and stopping before the end of the video.
    ///
    /// Files are named `frame_{index:04}_{seconds:.2}s.{ext}`.
    ///
    /// # Errors
    ///
    /// [`PlayheadError::InvalidInterval`] when the interval is not positive
    /// or would produce more than [`MAX_INTERVAL_FRAMES`] frames.
    pub fn frames_at_intervals(
        &self,
        path: &Path,
        interval_seconds: f64,
        directory: &Path,
        options: &FrameOptions,
    ) -> Result<Vec<VideoFrame>, PlayheadError> {
        self.interval_frames(path, interval_seconds, directory, options, None)
    }

    /// Like [`frames_at_intervals`](Self::frames_at_intervals), reporting
    /// one progress unit per written frame.
    pub fn frames_at_intervals_with_progress(
        &self,
        path: &Path,
        interval_seconds: f64,
        directory: &Path,
        options: &FrameOptions,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<Vec<VideoFrame>, PlayheadError> {
        self.interval_frames(path, interval_seconds, directory, options, Some(progress))
    }

    fn interval_frames(
        &self,
        path: &Path,
        interval_seconds: f64,
        directory: &Path,
        options: &FrameOptions,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Result<Vec<VideoFrame>, PlayheadError> {
        if !interval_seconds.is_finite() || interval_seconds <= 0.0 {
            return Err(PlayheadError::InvalidInterval);
        }
        options.validate()?;

        let metadata = self.toolkit.probe(path)?;
        let duration = metadata.duration_seconds;
        let planned = (duration / interval_seconds).ceil().max(0.0);
        if planned > MAX_INTERVAL_FRAMES as f64 {
            log::warn!(
                "Refusing {planned} frames every {interval_seconds}s from {}",
                path.display()
            );
            return Err(PlayheadError::InvalidInterval);
        }
        let count = planned as u64;
        fs::create_dir_all(directory)?;

        log::debug!(
            "Extracting {} frames every {:.2}s from {}",
            count,
            interval_seconds,
            path.display()
        );

        let video_id = path.to_string_lossy();
        let mut tracker = progress.map(|callback| {
            ProgressTracker::new(
                callback,
                OperationType::FrameExtraction,
                Some(count),
                0,
                Duration::ZERO,
            )
        });

        let mut frames = Vec::with_capacity(count as usize);
        let mut index: u64 = 0;
        loop {
            let timestamp = index as f64 * interval_seconds;
            if timestamp >= duration {
                break;
            }
            let name = format!(
                "frame_{index:04}_{timestamp:.2}s.{}",
                options.format.extension()
            );
            let frame = self.frame_with_metadata(
                &video_id,
                &metadata,
                timestamp,
                &directory.join(name),
                options,
            )?;
            frames.push(frame);
            if let Some(tracker) = tracker.as_mut() {
                tracker.advance();
            }
            index += 1;
        }

        if let Some(tracker) = tracker.as_mut() {
            tracker.finish();
        }

        log::info!(
            "Extracted {} frames from {} into {}",
            frames.len(),
            path.display(),
            directory.display()
        );
        Ok(frames)
    }
}

fn validate_timestamp(timestamp_seconds: f64, duration_seconds: f64) -> Result<(), PlayheadError> {
    let beyond_end = duration_seconds > 0.0 && timestamp_seconds > duration_seconds;
    if !timestamp_seconds.is_finite() || timestamp_seconds < 0.0 || beyond_end {
        return Err(PlayheadError::InvalidTimestamp(timestamp_seconds));
    }
    Ok(())
}
