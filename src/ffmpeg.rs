//! External tool facade.
//!
//! Everything that touches video content goes through the [`MediaToolkit`]
//! trait. [`FfmpegToolkit`] implements it by running `ffprobe` (JSON output)
//! for metadata and `ffmpeg` for single-frame extraction. Each invocation is
//! bounded by [`ToolOptions::timeout`]; a child that runs longer is killed.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use playhead::{FfmpegToolkit, FrameOptions, MediaToolkit, ToolOptions};
//!
//! let toolkit = FfmpegToolkit::new(ToolOptions::from_env());
//! let metadata = toolkit.probe(Path::new("input.mp4"))?;
//! toolkit.extract_frame(
//!     Path::new("input.mp4"),
//!     metadata.duration_seconds / 2.0,
//!     Path::new("middle.jpg"),
//!     &FrameOptions::default(),
//! )?;
//! # Ok::<(), playhead::PlayheadError>(())
//! ```

use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use serde::Deserialize;

use crate::config::{FrameOptions, ImageFormat, ToolOptions};
use crate::error::PlayheadError;
use crate::metadata::VideoMetadata;
use crate::utilities;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The external collaborator that reads metadata and writes frame images.
///
/// Implementations block the calling thread for the duration of the tool
/// invocation.
pub trait MediaToolkit: Send + Sync {
    /// Read duration, frame rate, resolution, codecs, and bit rates.
    ///
    /// # Errors
    ///
    /// [`PlayheadError::ProbeFailed`] when the file cannot be read and
    /// [`PlayheadError::NoVideoStream`] when it has no video stream.
    fn probe(&self, path: &Path) -> Result<VideoMetadata, PlayheadError>;

    /// Write exactly one image of the frame at `timestamp_seconds` to
    /// `output`.
    ///
    /// # Errors
    ///
    /// [`PlayheadError::ExtractionFailed`] when no image was produced.
    fn extract_frame(
        &self,
        path: &Path,
        timestamp_seconds: f64,
        output: &Path,
        options: &FrameOptions,
    ) -> Result<(), PlayheadError>;
}

/// [`MediaToolkit`] backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    options: ToolOptions,
}

impl FfmpegToolkit {
    /// Create a toolkit using the given binaries and timeout.
    pub fn new(options: ToolOptions) -> Self {
        Self { options }
    }

    /// Configured binaries and timeout.
    pub fn options(&self) -> &ToolOptions {
        &self.options
    }
}

impl MediaToolkit for FfmpegToolkit {
    fn probe(&self, path: &Path) -> Result<VideoMetadata, PlayheadError> {
        let file_size_bytes = fs::metadata(path)
            .map_err(|error| PlayheadError::ProbeFailed {
                path: path.to_path_buf(),
                reason: error.to_string(),
            })?
            .len();

        log::debug!("Probing {}", path.display());
        let args = probe_command_args(path);
        let output = run_tool(&self.options.ffprobe, &args, self.options.timeout)?;
        if !output.status.success() {
            return Err(PlayheadError::ProbeFailed {
                path: path.to_path_buf(),
                reason: failure_reason(&output),
            });
        }

        let json = String::from_utf8_lossy(&output.stdout);
        metadata_from_probe_json(path, &json, file_size_bytes)
    }

    fn extract_frame(
        &self,
        path: &Path,
        timestamp_seconds: f64,
        output: &Path,
        options: &FrameOptions,
    ) -> Result<(), PlayheadError> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        log::debug!(
            "Extracting frame at {:.3}s from {} to {} (format={}, quality={})",
            timestamp_seconds,
            path.display(),
            output.display(),
            options.format,
            options.quality
        );

        let args = frame_command_args(path, timestamp_seconds, output, options);
        let result = run_tool(&self.options.ffmpeg, &args, self.options.timeout)?;
        if !result.status.success() {
            return Err(PlayheadError::ExtractionFailed {
                path: path.to_path_buf(),
                reason: failure_reason(&result),
            });
        }

        // ffmpeg exits cleanly without writing anything when seeking past the end.
        match fs::metadata(output) {
            Ok(metadata) if metadata.len() > 0 => Ok(()),
            _ => Err(PlayheadError::ExtractionFailed {
                path: path.to_path_buf(),
                reason: format!("no image written at {timestamp_seconds:.3}s"),
            }),
        }
    }
}

/// Arguments passed to `ffprobe` for `path`.
pub fn probe_command_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_os_string());
    args
}

/// Arguments passed to `ffmpeg` to write one frame.
///
/// Seeking happens before `-i` so ffmpeg jumps to the nearest keyframe
/// instead of decoding from the start. JPEG output carries `-q:v` mapped
/// from the 1–100 quality.
pub fn frame_command_args(
    path: &Path,
    timestamp_seconds: f64,
    output: &Path,
    options: &FrameOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(16);
    for arg in ["-v", "error", "-y", "-ss"] {
        args.push(arg.into());
    }
    args.push(format!("{:.3}", timestamp_seconds.max(0.0)).into());
    args.push("-i".into());
    args.push(path.as_os_str().to_os_string());
    for arg in ["-frames:v", "1", "-c:v", encoder_name(options.format)] {
        args.push(arg.into());
    }
    if options.format == ImageFormat::Jpeg {
        args.push("-q:v".into());
        args.push(options.native_quality().to_string().into());
    }
    args.push("-f".into());
    args.push("image2".into());
    args.push(output.as_os_str().to_os_string());
    args
}

fn encoder_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "mjpeg",
        ImageFormat::Png => "png",
        ImageFormat::Bmp => "bmp",
        ImageFormat::WebP => "libwebp",
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

/// Build [`VideoMetadata`] from `ffprobe -print_format json` output.
///
/// Uses the first video stream and the first audio stream. Frame rate comes
/// from `r_frame_rate`, falling back to `avg_frame_rate`; duration comes from
/// the container, falling back to the video stream.
///
/// # Errors
///
/// [`PlayheadError::ProbeOutput`] for malformed JSON and
/// [`PlayheadError::NoVideoStream`] when no video stream is listed.
pub fn metadata_from_probe_json(
    path: &Path,
    json: &str,
    file_size_bytes: u64,
) -> Result<VideoMetadata, PlayheadError> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let video = probe
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| PlayheadError::NoVideoStream {
            path: path.to_path_buf(),
        })?;
    let audio = probe
        .streams
        .iter()
        .find(|stream| stream.codec_type.as_deref() == Some("audio"));

    let frame_rate = video
        .r_frame_rate
        .as_deref()
        .and_then(utilities::parse_rational)
        .or_else(|| video.avg_frame_rate.as_deref().and_then(utilities::parse_rational))
        .unwrap_or(0.0);

    let duration_seconds = probe
        .format
        .as_ref()
        .and_then(|format| parse_seconds(format.duration.as_deref()))
        .or_else(|| parse_seconds(video.duration.as_deref()))
        .unwrap_or(0.0);

    Ok(VideoMetadata {
        path: path.to_path_buf(),
        duration_seconds,
        frame_rate,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        video_codec: video.codec_name.clone().unwrap_or_default(),
        audio_codec: audio.and_then(|stream| stream.codec_name.clone()),
        video_bitrate: parse_bitrate(video.bit_rate.as_deref()),
        audio_bitrate: audio
            .map(|stream| parse_bitrate(stream.bit_rate.as_deref()))
            .unwrap_or(0),
        file_size_bytes,
        format: probe
            .format
            .and_then(|format| format.format_name)
            .unwrap_or_default(),
        extracted_at: Local::now(),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

fn parse_bitrate(value: Option<&str>) -> u64 {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

struct ToolOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn failure_reason(output: &ToolOutput) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

/// Run `program` to completion, killing it once `timeout` elapses.
///
/// Both pipes are drained on helper threads so a chatty child cannot block
/// on a full pipe while we wait for it.
fn run_tool(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<ToolOutput, PlayheadError> {
    let tool = program.display().to_string();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| match error.kind() {
            IoErrorKind::NotFound => PlayheadError::ToolNotFound { tool: tool.clone() },
            _ => PlayheadError::IoError(error),
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            log::warn!("{tool} exceeded {timeout:?}; killing it");
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(PlayheadError::ToolTimeout { tool, timeout });
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(ToolOutput {
        status,
        stdout: stdout.map(collect).unwrap_or_default(),
        stderr: stderr.map(collect).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        buffer
    })
}

fn collect(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}
