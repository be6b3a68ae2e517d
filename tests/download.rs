//! Download integration tests.
//!
//! Every test runs against a local HTTP server from `common`, so no network
//! access is needed.

mod common;

use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{RangeSupport, TestServer, sample_body};
use playhead::{
    CancellationToken, DownloadOptions, DownloadRequest, ErrorKind, HttpDownloader,
    OperationType, PlayheadError, ProgressInfo, VideoDownloader,
};

const BODY_LEN: usize = 200_000;

fn recording_options() -> (DownloadOptions, Arc<Mutex<Vec<ProgressInfo>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let options = DownloadOptions::new()
        .with_buffer_size(4096)
        .with_progress_interval(Duration::ZERO)
        .with_progress(Arc::new(move |info: &ProgressInfo| {
            sink.lock().unwrap().push(info.clone());
        }));
    (options, reports)
}

// ── Request validation ─────────────────────────────────────────────

#[test]
fn request_defaults_to_resume() {
    let request = DownloadRequest::new("https://example.com/a.mp4", "a.mp4").unwrap();
    assert!(request.resume());
    assert_eq!(request.url().as_str(), "https://example.com/a.mp4");
    assert_eq!(request.destination(), std::path::Path::new("a.mp4"));
}

#[test]
fn request_rejects_blank_url() {
    let error = DownloadRequest::builder()
        .url("   ")
        .destination("a.mp4")
        .build()
        .unwrap_err();
    assert!(matches!(error, PlayheadError::InvalidRequest(_)));
    assert_eq!(error.kind(), ErrorKind::Validation);
}

#[test]
fn request_rejects_missing_url() {
    let result = DownloadRequest::builder().destination("a.mp4").build();
    assert!(matches!(result, Err(PlayheadError::InvalidRequest(_))));
}

#[test]
fn request_rejects_non_http_scheme() {
    let result = DownloadRequest::new("ftp://example.com/a.mp4", "a.mp4");
    assert!(matches!(result, Err(PlayheadError::InvalidRequest(_))));
}

#[test]
fn request_rejects_relative_url() {
    let result = DownloadRequest::new("videos/a.mp4", "a.mp4");
    assert!(matches!(result, Err(PlayheadError::InvalidRequest(_))));
}

#[test]
fn request_rejects_empty_destination() {
    let result = DownloadRequest::new("https://example.com/a.mp4", "");
    assert!(matches!(result, Err(PlayheadError::InvalidRequest(_))));
}

// ── Fresh downloads ────────────────────────────────────────────────

#[test]
fn fresh_download_writes_whole_body() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body.clone(), RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("nested/dir/video.mp4");

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    let bytes = HttpDownloader::default().download(&request).unwrap();

    assert_eq!(bytes, BODY_LEN as u64);
    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(server.requests(), vec![None]);
}

#[test]
fn non_resume_request_replaces_existing_file() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body.clone(), RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");
    fs::write(&destination, vec![0xAA; 5_000]).unwrap();

    let request = DownloadRequest::builder()
        .url(server.url.clone())
        .destination(&destination)
        .resume(false)
        .build()
        .unwrap();
    let bytes = HttpDownloader::default().download(&request).unwrap();

    assert_eq!(bytes, BODY_LEN as u64);
    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(server.requests(), vec![None]);
}

// ── Resume ─────────────────────────────────────────────────────────

#[test]
fn resume_appends_missing_tail() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body.clone(), RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");
    fs::write(&destination, &body[..70_000]).unwrap();

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    let bytes = HttpDownloader::default().download(&request).unwrap();

    assert_eq!(bytes, BODY_LEN as u64);
    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(server.requests(), vec![Some("bytes=70000-".to_string())]);
}

#[test]
fn ignored_range_restarts_from_zero() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body.clone(), RangeSupport::Ignored);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");
    fs::write(&destination, &body[..70_000]).unwrap();

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    let bytes = HttpDownloader::default().download(&request).unwrap();

    // The file must equal the body, not the prefix concatenated with it.
    assert_eq!(bytes, BODY_LEN as u64);
    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(server.requests(), vec![Some("bytes=70000-".to_string())]);
}

#[test]
fn resume_without_existing_file_sends_no_range() {
    let body = sample_body(10_000);
    let server = TestServer::start(body.clone(), RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    HttpDownloader::default().download(&request).unwrap();

    assert_eq!(server.requests(), vec![None]);
    assert_eq!(fs::read(&destination).unwrap(), body);
}

// ── Failures ───────────────────────────────────────────────────────

#[test]
fn not_found_is_http_status_error() {
    let server = TestServer::start(Vec::new(), RangeSupport::NotFound);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    let error = HttpDownloader::default().download(&request).unwrap_err();

    assert!(
        matches!(error, PlayheadError::HttpStatus { status: 404, .. }),
        "unexpected error: {error}"
    );
    assert_eq!(error.kind(), ErrorKind::Transport);
}

#[test]
fn connection_refused_is_transport_error() {
    // Bind and drop to find a port nobody listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let directory = tempfile::tempdir().unwrap();
    let request = DownloadRequest::new(
        &format!("http://127.0.0.1:{port}/video.mp4"),
        directory.path().join("video.mp4"),
    )
    .unwrap();

    let error = HttpDownloader::new(
        DownloadOptions::new().with_connect_timeout(Duration::from_secs(2)),
    )
    .download(&request)
    .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Transport);
}

#[test]
fn cancelled_download_keeps_partial_file() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body, RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let token = CancellationToken::new();
    token.cancel();
    let options = DownloadOptions::new().with_cancellation(token);

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    let error = HttpDownloader::new(options).download(&request).unwrap_err();

    assert!(matches!(error, PlayheadError::Cancelled));
    assert!(destination.exists());
}

#[test]
fn dropped_connection_keeps_partial_file_for_resume() {
    let body = sample_body(100_000);
    let server = TestServer::start(body.clone(), RangeSupport::DropsAfter(40_000));
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");
    let request = DownloadRequest::new(&server.url, &destination).unwrap();

    let error = HttpDownloader::default().download(&request).unwrap_err();
    assert!(
        matches!(error, PlayheadError::Transport(_)),
        "unexpected error: {error}"
    );
    assert_eq!(error.kind(), ErrorKind::Transport);
    assert_eq!(fs::read(&destination).unwrap(), &body[..40_000]);

    let bytes = HttpDownloader::default().download(&request).unwrap();
    assert_eq!(bytes, 100_000);
    assert_eq!(fs::read(&destination).unwrap(), body);
    assert_eq!(
        server.requests(),
        vec![None, Some("bytes=40000-".to_string())]
    );
}

// ── Progress ───────────────────────────────────────────────────────

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body, RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let (options, reports) = recording_options();
    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    HttpDownloader::new(options).download(&request).unwrap();

    let reports = reports.lock().unwrap();
    assert!(reports.len() > 1, "expected several reports");
    let percentages: Vec<f64> = reports
        .iter()
        .map(|info| info.percentage.unwrap())
        .collect();
    for pair in percentages.windows(2) {
        assert!(pair[0] <= pair[1], "progress went backwards: {percentages:?}");
    }
    assert!(percentages.iter().all(|pct| (0.0..=100.0).contains(pct)));
    assert_eq!(*percentages.last().unwrap(), 100.0);
    assert!(reports.iter().all(|info| info.operation == OperationType::Download));
    assert_eq!(reports.last().unwrap().total, Some(BODY_LEN as u64));
}

#[test]
fn progress_is_throttled_to_the_default_interval() {
    const CHUNKS: usize = 15;
    let body = sample_body(CHUNKS * 4_000);
    let server = TestServer::start(
        body,
        RangeSupport::Trickle {
            chunk: 4_000,
            pause_ms: 100,
        },
    );
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let options = DownloadOptions::new()
        .with_buffer_size(4096)
        .with_progress(Arc::new(move |info: &ProgressInfo| {
            sink.lock().unwrap().push(info.clone());
        }));
    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    HttpDownloader::new(options).download(&request).unwrap();

    let reports = reports.lock().unwrap();
    let (last, throttled) = reports.split_last().unwrap();
    assert_eq!(last.percentage, Some(100.0));
    assert!(throttled.len() < CHUNKS, "{} reports", reports.len());

    let interval = Duration::from_millis(500);
    let mut previous = Duration::ZERO;
    for info in throttled {
        assert!(
            info.elapsed - previous >= interval,
            "reports {previous:?} and {:?} are too close",
            info.elapsed
        );
        previous = info.elapsed;
    }
}

#[test]
fn resumed_progress_counts_existing_bytes() {
    let body = sample_body(BODY_LEN);
    let server = TestServer::start(body.clone(), RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");
    fs::write(&destination, &body[..100_000]).unwrap();

    let (options, reports) = recording_options();
    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    HttpDownloader::new(options).download(&request).unwrap();

    let reports = reports.lock().unwrap();
    let first = reports.first().unwrap();
    assert!(first.current > 100_000);
    assert!(first.percentage.unwrap() > 50.0);
    assert_eq!(first.total, Some(BODY_LEN as u64));
}

#[test]
fn download_with_progress_overrides_configured_callback() {
    let body = sample_body(20_000);
    let server = TestServer::start(body, RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let (options, configured) = recording_options();
    let explicit = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&explicit);

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    HttpDownloader::new(options)
        .download_with_progress(
            &request,
            Arc::new(move |info: &ProgressInfo| {
                sink.lock().unwrap().push(info.percentage);
            }),
        )
        .unwrap();

    assert!(configured.lock().unwrap().is_empty());
    assert_eq!(explicit.lock().unwrap().last(), Some(&Some(100.0)));
}

// ── Async ──────────────────────────────────────────────────────────

#[cfg(feature = "async")]
#[tokio::test]
async fn async_download_resolves_to_byte_count() {
    let body = sample_body(30_000);
    let server = TestServer::start(body.clone(), RangeSupport::Honoured);
    let directory = tempfile::tempdir().unwrap();
    let destination = directory.path().join("video.mp4");

    let request = DownloadRequest::new(&server.url, &destination).unwrap();
    let bytes = playhead::download_async(Arc::new(HttpDownloader::default()), request)
        .await
        .unwrap();

    assert_eq!(bytes, 30_000);
    assert_eq!(fs::read(&destination).unwrap(), body);
}
