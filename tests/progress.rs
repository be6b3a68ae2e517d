//! Progress and cancellation integration tests.

mod common;

use std::sync::{Arc, Mutex};

use common::FakeToolkit;
use playhead::{
    CancellationToken, FrameExtractor, FrameOptions, OperationType, ProgressCallback,
    ProgressInfo,
};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    assert!(!CancellationToken::new().is_cancelled());
    assert!(!CancellationToken::default().is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_is_visible_across_threads() {
    let token = CancellationToken::new();
    let remote = token.clone();
    std::thread::spawn(move || remote.cancel()).join().unwrap();
    assert!(token.is_cancelled());
}

// ── Callbacks ──────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    reports: Mutex<Vec<ProgressInfo>>,
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, info: &ProgressInfo) {
        self.reports.lock().unwrap().push(info.clone());
    }
}

#[test]
fn closures_are_progress_callbacks() {
    let seen = Arc::new(Mutex::new(0_u64));
    let sink = Arc::clone(&seen);
    let callback: Arc<dyn ProgressCallback> = Arc::new(move |info: &ProgressInfo| {
        *sink.lock().unwrap() = info.current;
    });

    callback.on_progress(&ProgressInfo {
        operation: OperationType::Download,
        current: 42,
        total: None,
        percentage: None,
        elapsed: std::time::Duration::ZERO,
        estimated_remaining: None,
    });
    assert_eq!(*seen.lock().unwrap(), 42);
}

#[test]
fn interval_extraction_reports_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let extractor = FrameExtractor::new(Arc::new(FakeToolkit::new(10.0, 25.0)));
    let recorder = Arc::new(Recorder::default());

    let frames = extractor
        .frames_at_intervals_with_progress(
            "clip.mp4".as_ref(),
            2.5,
            dir.path(),
            &FrameOptions::default(),
            recorder.clone(),
        )
        .unwrap();
    assert_eq!(frames.len(), 4);

    let reports = recorder.reports.lock().unwrap();
    assert_eq!(reports.len(), 5);
    assert!(
        reports
            .iter()
            .all(|info| info.operation == OperationType::FrameExtraction)
    );
    assert!(reports.iter().all(|info| info.total == Some(4)));

    let percentages: Vec<f64> = reports.iter().filter_map(|info| info.percentage).collect();
    assert!(percentages.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(percentages.last().copied(), Some(100.0));
    assert_eq!(reports.last().unwrap().current, 4);
}
