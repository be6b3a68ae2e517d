//! Shared fixtures for integration tests.
//!
//! [`FakeToolkit`] stands in for ffprobe/ffmpeg so session and frame tests
//! run without external binaries, and [`TestServer`] is a minimal HTTP/1.1
//! server for download tests.

#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Local;
use playhead::{FrameOptions, MediaToolkit, PlayheadError, VideoMetadata};

// ── Fake media toolkit ─────────────────────────────────────────────

/// Probes return fixed metadata; extraction writes a small placeholder file.
pub struct FakeToolkit {
    pub duration_seconds: f64,
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
    pub probe_calls: AtomicUsize,
    pub extractions: Mutex<Vec<(PathBuf, f64, FrameOptions)>>,
}

impl FakeToolkit {
    pub fn new(duration_seconds: f64, frame_rate: f64) -> Self {
        Self {
            duration_seconds,
            frame_rate,
            width: 1920,
            height: 1080,
            probe_calls: AtomicUsize::new(0),
            extractions: Mutex::new(Vec::new()),
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn extracted_timestamps(&self) -> Vec<f64> {
        self.extractions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, timestamp, _)| *timestamp)
            .collect()
    }
}

impl MediaToolkit for FakeToolkit {
    fn probe(&self, path: &Path) -> Result<VideoMetadata, PlayheadError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if path.to_string_lossy().contains("missing") {
            return Err(PlayheadError::ProbeFailed {
                path: path.to_path_buf(),
                reason: "No such file or directory".to_string(),
            });
        }
        Ok(VideoMetadata {
            path: path.to_path_buf(),
            duration_seconds: self.duration_seconds,
            frame_rate: self.frame_rate,
            width: self.width,
            height: self.height,
            video_codec: "h264".to_string(),
            audio_codec: Some("aac".to_string()),
            video_bitrate: 4_000_000,
            audio_bitrate: 128_000,
            file_size_bytes: fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            extracted_at: Local::now(),
        })
    }

    fn extract_frame(
        &self,
        path: &Path,
        timestamp_seconds: f64,
        output: &Path,
        options: &FrameOptions,
    ) -> Result<(), PlayheadError> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, b"not really an image")?;
        self.extractions
            .lock()
            .unwrap()
            .push((path.to_path_buf(), timestamp_seconds, *options));
        Ok(())
    }
}

// ── HTTP fixture server ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSupport {
    /// Honour `Range: bytes=N-` with 206.
    Honoured,
    /// Always answer 200 with the full body.
    Ignored,
    /// Always answer 404.
    NotFound,
    /// Honour ranges, but a full-body answer advertises the whole length and
    /// closes the connection after this many body bytes.
    DropsAfter(usize),
    /// Answer 200 with the full body, written in `chunk`-byte pieces with a
    /// pause of `pause_ms` between them.
    Trickle { chunk: usize, pause_ms: u64 },
}

/// Serves one body at every path until the test process exits.
pub struct TestServer {
    pub url: String,
    pub range_headers: Arc<Mutex<Vec<Option<String>>>>,
}

impl TestServer {
    pub fn start(body: Vec<u8>, support: RangeSupport) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/video.mp4", listener.local_addr().unwrap());
        let range_headers = Arc::new(Mutex::new(Vec::new()));

        let body = Arc::new(body);
        let seen = Arc::clone(&range_headers);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let body = Arc::clone(&body);
                let seen = Arc::clone(&seen);
                thread::spawn(move || serve(stream, &body, support, &seen));
            }
        });

        Self { url, range_headers }
    }

    pub fn requests(&self) -> Vec<Option<String>> {
        self.range_headers.lock().unwrap().clone()
    }
}

fn serve(
    mut stream: TcpStream,
    body: &[u8],
    support: RangeSupport,
    seen: &Mutex<Vec<Option<String>>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut range = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            return;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_string());
            }
        }
    }
    seen.lock().unwrap().push(range.clone());

    let offset = range
        .as_deref()
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|value| value.trim_end_matches('-').parse::<usize>().ok());

    let (head, payload): (String, &[u8]) = match (support, offset) {
        (RangeSupport::NotFound, _) => (
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
            &[],
        ),
        (RangeSupport::Honoured | RangeSupport::DropsAfter(_), Some(start))
            if start < body.len() =>
        {
            let tail = &body[start..];
            let head = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nConnection: close\r\n\r\n",
                tail.len(),
                start,
                body.len() - 1,
                body.len()
            );
            (head, tail)
        }
        _ => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            (head, body)
        }
    };

    let _ = stream.write_all(head.as_bytes());
    match support {
        RangeSupport::DropsAfter(limit) if offset.is_none() => {
            let _ = stream.write_all(&payload[..limit.min(payload.len())]);
        }
        RangeSupport::Trickle { chunk, pause_ms } => {
            for piece in payload.chunks(chunk.max(1)) {
                let _ = stream.write_all(piece);
                let _ = stream.flush();
                thread::sleep(Duration::from_millis(pause_ms));
            }
        }
        _ => {
            let _ = stream.write_all(payload);
        }
    }
    let _ = stream.flush();
}

/// Deterministic body of `len` bytes.
pub fn sample_body(len: usize) -> Vec<u8> {
    (0..len).map(|index| (index % 251) as u8).collect()
}
