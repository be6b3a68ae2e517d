//! Metadata parsing and formatting tests.
//!
//! Probe output is parsed from captured `ffprobe -print_format json`
//! documents, so no ffprobe binary is needed.

use std::path::{Path, PathBuf};

use chrono::Local;
use playhead::ffmpeg::{frame_command_args, metadata_from_probe_json, probe_command_args};
use playhead::{ErrorKind, FrameOptions, ImageFormat, PlayheadError, VideoFrame, VideoMetadata};

const PROBE_H264_AAC: &str = r#"{
  "streams": [
    {
      "index": 0,
      "codec_name": "h264",
      "codec_type": "video",
      "width": 1920,
      "height": 1080,
      "r_frame_rate": "30000/1001",
      "avg_frame_rate": "30000/1001",
      "bit_rate": "4500000",
      "duration": "299.5"
    },
    {
      "index": 1,
      "codec_name": "aac",
      "codec_type": "audio",
      "sample_rate": "48000",
      "channels": 2,
      "bit_rate": "128000"
    }
  ],
  "format": {
    "filename": "clip.mp4",
    "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
    "duration": "300.000000",
    "size": "50000000"
  }
}"#;

const PROBE_SILENT_NO_CONTAINER_DURATION: &str = r#"{
  "streams": [
    {
      "codec_name": "vp9",
      "codec_type": "video",
      "width": 640,
      "height": 360,
      "r_frame_rate": "0/0",
      "avg_frame_rate": "25/1",
      "duration": "12.5"
    }
  ],
  "format": { "format_name": "matroska,webm" }
}"#;

const PROBE_AUDIO_ONLY: &str = r#"{
  "streams": [ { "codec_name": "mp3", "codec_type": "audio" } ],
  "format": { "format_name": "mp3", "duration": "180.0" }
}"#;

fn sample_metadata() -> VideoMetadata {
    VideoMetadata {
        path: PathBuf::from("clip.mp4"),
        duration_seconds: 300.0,
        frame_rate: 25.0,
        width: 1920,
        height: 1080,
        video_codec: "h264".to_string(),
        audio_codec: Some("aac".to_string()),
        video_bitrate: 4_500_000,
        audio_bitrate: 128_000,
        file_size_bytes: 50_000_000,
        format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
        extracted_at: Local::now(),
    }
}

// ── Derived values ─────────────────────────────────────────────────

#[test]
fn derived_values_of_five_minute_clip() {
    let metadata = sample_metadata();
    assert_eq!(metadata.total_frames(), 7500);
    assert_eq!(metadata.formatted_duration(), "00:05:00");
    assert_eq!(metadata.resolution(), "1920x1080");
    assert_eq!(metadata.formatted_file_size(), "47.7 MB");
    assert!(metadata.has_audio());
}

#[test]
fn formatted_duration_of_long_video() {
    let mut metadata = sample_metadata();
    metadata.duration_seconds = 7323.0;
    assert_eq!(metadata.formatted_duration(), "02:02:03");
}

#[test]
fn formatted_file_size_units() {
    let mut metadata = sample_metadata();
    for (bytes, expected) in [
        (512, "512 B"),
        (1536, "1.5 KB"),
        (50_000_000, "47.7 MB"),
        (3 * 1024 * 1024 * 1024, "3.0 GB"),
    ] {
        metadata.file_size_bytes = bytes;
        assert_eq!(metadata.formatted_file_size(), expected);
    }
}

#[test]
fn zero_duration_has_no_frames() {
    let mut metadata = sample_metadata();
    metadata.duration_seconds = 0.0;
    assert_eq!(metadata.total_frames(), 0);
}

#[test]
fn frame_helpers() {
    let frame = VideoFrame {
        video_id: "clip".to_string(),
        frame_number: 1831,
        timestamp_seconds: 61.25,
        path: PathBuf::from("out/frame_0001.jpg"),
        format: "jpg".to_string(),
        width: 1920,
        height: 1080,
        file_size_bytes: 2048,
        extracted_at: Local::now(),
        quality: 90,
    };
    assert_eq!(frame.formatted_timestamp(), "00:01:01.250");
    assert_eq!(frame.file_name(), Some("frame_0001.jpg"));
    assert_eq!(frame.formatted_file_size(), "2.0 KB");
    assert_eq!(frame.path(), Path::new("out/frame_0001.jpg"));
}

// ── Probe output ───────────────────────────────────────────────────

#[test]
fn parses_video_and_audio_streams() {
    let metadata =
        metadata_from_probe_json(Path::new("clip.mp4"), PROBE_H264_AAC, 50_000_000).unwrap();

    assert_eq!(metadata.duration_seconds, 300.0);
    assert!((metadata.frame_rate - 29.97).abs() < 0.01);
    assert_eq!((metadata.width, metadata.height), (1920, 1080));
    assert_eq!(metadata.video_codec, "h264");
    assert_eq!(metadata.audio_codec.as_deref(), Some("aac"));
    assert_eq!(metadata.video_bitrate, 4_500_000);
    assert_eq!(metadata.audio_bitrate, 128_000);
    assert_eq!(metadata.file_size_bytes, 50_000_000);
    assert_eq!(metadata.format, "mov,mp4,m4a,3gp,3g2,mj2");
    assert_eq!(metadata.path, Path::new("clip.mp4"));
}

#[test]
fn falls_back_to_average_rate_and_stream_duration() {
    let metadata =
        metadata_from_probe_json(Path::new("clip.webm"), PROBE_SILENT_NO_CONTAINER_DURATION, 1)
            .unwrap();

    assert_eq!(metadata.frame_rate, 25.0);
    assert_eq!(metadata.duration_seconds, 12.5);
    assert!(!metadata.has_audio());
    assert_eq!(metadata.audio_bitrate, 0);
    assert_eq!(metadata.video_bitrate, 0);
}

#[test]
fn audio_only_file_has_no_video_stream() {
    let error = metadata_from_probe_json(Path::new("song.mp3"), PROBE_AUDIO_ONLY, 1).unwrap_err();
    assert!(matches!(error, PlayheadError::NoVideoStream { .. }));
    assert_eq!(error.kind(), ErrorKind::Probe);
}

#[test]
fn malformed_probe_output_is_probe_error() {
    let error = metadata_from_probe_json(Path::new("clip.mp4"), "not json", 1).unwrap_err();
    assert!(matches!(error, PlayheadError::ProbeOutput(_)));
    assert_eq!(error.kind(), ErrorKind::Probe);
}

// ── Command lines ──────────────────────────────────────────────────

#[test]
fn probe_arguments() {
    let args = probe_command_args(Path::new("clip.mp4"));
    let args: Vec<String> = args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        args,
        [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "clip.mp4"
        ]
    );
}

#[test]
fn jpeg_frame_arguments_carry_mapped_quality() {
    let args = frame_command_args(
        Path::new("clip.mp4"),
        12.5,
        Path::new("out.jpg"),
        &FrameOptions::new().with_quality(100),
    );
    let joined = args
        .iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(
        joined,
        "-v error -y -ss 12.500 -i clip.mp4 -frames:v 1 -c:v mjpeg -q:v 1 -f image2 out.jpg"
    );
}

#[test]
fn png_frame_arguments_have_no_quality() {
    let args = frame_command_args(
        Path::new("clip.mp4"),
        0.0,
        Path::new("out.png"),
        &FrameOptions::new().with_format(ImageFormat::Png),
    );
    assert!(!args.iter().any(|arg| arg == "-q:v"));
    assert!(args.iter().any(|arg| arg == "png"));
}

#[test]
fn webp_frames_use_libwebp_without_quality() {
    let args = frame_command_args(
        Path::new("clip.mp4"),
        1.0,
        Path::new("out.webp"),
        &FrameOptions::new().with_format(ImageFormat::WebP),
    );
    assert!(args.iter().any(|arg| arg == "libwebp"));
    assert!(!args.iter().any(|arg| arg == "-q:v"));
}
