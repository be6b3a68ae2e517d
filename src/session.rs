//! Playback sessions.
//!
//! A [`SessionManager`] owns the registry of live [`VideoProgress`]
//! trackers, a metadata cache, and a clock task that advances every playing
//! tracker once per tick. Callers and the clock share one lock, so every
//! read-modify-recompute on a tracker is atomic with respect to the others.
//!
//! # Example
//!
//! ```no_run
//! use playhead::{SessionManager, VideoId};
//!
//! let manager = SessionManager::with_defaults()?;
//! let started = manager.start_session("input.mp4".as_ref())?;
//! let id = started.video_id().clone();
//!
//! manager.seek(&id, 30.0);
//! let frame = manager.extract_frame_at_current_position(&id, "now.jpg".as_ref())?;
//! println!("frame {} at {}", frame.frame_number, frame.formatted_timestamp());
//!
//! manager.stop(&id);
//! manager.shutdown();
//! # Ok::<(), playhead::PlayheadError>(())
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{FrameOptions, SessionOptions, ToolOptions};
use crate::download::{DownloadRequest, HttpDownloader, VideoDownloader};
use crate::error::PlayheadError;
use crate::ffmpeg::{FfmpegToolkit, MediaToolkit};
use crate::frames::FrameExtractor;
use crate::metadata::{VideoFrame, VideoMetadata};
use crate::playback::{TickOutcome, VideoId, VideoProgress};
use crate::probe::MetadataCache;
use crate::progress::ProgressInfo;
use crate::thumbnail::{ThumbnailHandle, VideoSummary};

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Receives playback events from a [`SessionManager`].
///
/// Callbacks run on the thread that caused the event (the caller's thread
/// for start/pause/resume/seek/stop, the clock thread for progress and
/// completion) after the registry lock has been released.
pub trait PlaybackListener: Send + Sync {
    /// The position of a playing tracker moved on a clock tick.
    fn on_progress_update(&self, progress: &VideoProgress);

    /// A session started playing.
    fn on_playback_started(&self, _progress: &VideoProgress) {}

    /// A session was paused.
    fn on_playback_paused(&self, _progress: &VideoProgress) {}

    /// A paused session was resumed.
    fn on_playback_resumed(&self, _progress: &VideoProgress) {}

    /// A session was stopped and removed.
    fn on_playback_stopped(&self, _progress: &VideoProgress) {}

    /// A session reached the end of the video.
    fn on_playback_completed(&self, _progress: &VideoProgress) {}

    /// A session moved from `from_seconds` to `to_seconds`.
    fn on_seek(&self, _progress: &VideoProgress, _from_seconds: f64, _to_seconds: f64) {}
}

/// Progress of a download started through
/// [`SessionManager::download_with_progress`].
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    /// Identifier the download is registered under.
    pub video_id: VideoId,
    /// Bytes on disk so far, including bytes from before a resume.
    pub bytes_downloaded: u64,
    /// Expected final size, when the server reported a length.
    pub total_bytes: Option<u64>,
    /// Completion percentage (0 when the total is unknown).
    pub percentage: f64,
}

enum PlaybackEvent {
    Started(VideoProgress),
    Paused(VideoProgress),
    Resumed(VideoProgress),
    Stopped(VideoProgress),
    Completed(VideoProgress),
    Progress(VideoProgress),
    Seek {
        progress: VideoProgress,
        from_seconds: f64,
        to_seconds: f64,
    },
}

impl PlaybackEvent {
    fn dispatch(&self, listener: &dyn PlaybackListener) {
        match self {
            PlaybackEvent::Started(progress) => listener.on_playback_started(progress),
            PlaybackEvent::Paused(progress) => listener.on_playback_paused(progress),
            PlaybackEvent::Resumed(progress) => listener.on_playback_resumed(progress),
            PlaybackEvent::Stopped(progress) => listener.on_playback_stopped(progress),
            PlaybackEvent::Completed(progress) => listener.on_playback_completed(progress),
            PlaybackEvent::Progress(progress) => listener.on_progress_update(progress),
            PlaybackEvent::Seek {
                progress,
                from_seconds,
                to_seconds,
            } => listener.on_seek(progress, *from_seconds, *to_seconds),
        }
    }
}

struct Entry {
    progress: VideoProgress,
    generation: u64,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<VideoId, Entry>,
    next_generation: u64,
    closed: bool,
}

impl Registry {
    /// Insert `progress`, replacing any tracker under the same identifier.
    fn insert(&mut self, progress: VideoProgress) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.entries.insert(
            progress.video_id().clone(),
            Entry {
                progress,
                generation,
            },
        );
        generation
    }
}

/// State shared between the manager and its clock task.
#[derive(Default)]
struct Shared {
    registry: Mutex<Registry>,
    listeners: RwLock<Vec<Arc<dyn PlaybackListener>>>,
}

impl Shared {
    fn tick(&self, step_seconds: f64) {
        let mut events = Vec::new();
        {
            let mut registry = self.registry.lock();
            for (id, entry) in registry.entries.iter_mut() {
                let progress = &mut entry.progress;
                match progress.tick(step_seconds) {
                    Ok(TickOutcome::Idle) => {}
                    Ok(TickOutcome::Advanced) => {
                        events.push(PlaybackEvent::Progress(progress.clone()));
                    }
                    Ok(TickOutcome::Completed) => {
                        log::info!("Playback of {id} completed");
                        events.push(PlaybackEvent::Progress(progress.clone()));
                        events.push(PlaybackEvent::Completed(progress.clone()));
                    }
                    Err(error) => {
                        log::warn!("Pausing {id}: {error}");
                        progress.pause();
                    }
                }
            }
        }
        self.notify(&events);
    }

    fn notify(&self, events: &[PlaybackEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for event in events {
            for listener in &listeners {
                event.dispatch(listener.as_ref());
            }
        }
    }

    /// Apply `mutate` to a registered tracker under the lock, then notify
    /// listeners of the event it returns.
    fn update<F>(&self, id: &VideoId, mutate: F) -> Option<VideoProgress>
    where
        F: FnOnce(&mut VideoProgress) -> PlaybackEvent,
    {
        let (snapshot, event) = {
            let mut registry = self.registry.lock();
            let entry = registry.entries.get_mut(id)?;
            let event = mutate(&mut entry.progress);
            (entry.progress.clone(), event)
        };
        self.notify(&[event]);
        Some(snapshot)
    }
}

struct Clock {
    stop: oneshot::Sender<()>,
    finished: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Registry of playback sessions driven by a periodic clock.
///
/// The clock starts with the first session and advances every playing
/// tracker by [`SessionOptions::tick_step_seconds`] once per
/// [`SessionOptions::tick_interval`]. Dropping the manager shuts it down.
pub struct SessionManager {
    shared: Arc<Shared>,
    cache: MetadataCache,
    extractor: FrameExtractor,
    downloader: Arc<dyn VideoDownloader>,
    options: SessionOptions,
    clock: Mutex<Option<Clock>>,
    runtime: Option<Runtime>,
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SessionManager")
            .field("options", &self.options)
            .field("sessions", &self.shared.registry.lock().entries.len())
            .field("cached_metadata", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager over the given collaborators.
    ///
    /// # Errors
    ///
    /// [`PlayheadError::IoError`] if the clock runtime cannot be created.
    pub fn new(
        toolkit: Arc<dyn MediaToolkit>,
        downloader: Arc<dyn VideoDownloader>,
        options: SessionOptions,
    ) -> Result<Self, PlayheadError> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .worker_threads(1)
            .thread_name("playhead-clock")
            .enable_time()
            .build()?;

        Ok(Self {
            shared: Arc::new(Shared::default()),
            cache: MetadataCache::new(),
            extractor: FrameExtractor::new(toolkit),
            downloader,
            options,
            clock: Mutex::new(None),
            runtime: Some(runtime),
        })
    }

    /// Create a manager using `ffprobe`/`ffmpeg` (paths from the
    /// environment), a default [`HttpDownloader`], and default options.
    pub fn with_defaults() -> Result<Self, PlayheadError> {
        Self::new(
            Arc::new(FfmpegToolkit::new(ToolOptions::from_env())),
            Arc::new(HttpDownloader::default()),
            SessionOptions::default(),
        )
    }

    /// The options this manager was built with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The extractor used for frame requests.
    pub fn frame_extractor(&self) -> &FrameExtractor {
        &self.extractor
    }

    /// Register a listener for playback events.
    pub fn add_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Metadata for `path`, probed on first use and cached until the file
    /// size changes.
    pub fn metadata(&self, path: &Path) -> Result<VideoMetadata, PlayheadError> {
        self.cache.get_or_probe(self.extractor.toolkit().as_ref(), path)
    }

    /// Start playing `path` under [`VideoId::from_path`].
    pub fn start_session(&self, path: &Path) -> Result<VideoProgress, PlayheadError> {
        self.start_session_with_id(VideoId::from_path(path), path)
    }

    /// Start playing `path` from position 0 under `video_id`.
    ///
    /// A session already registered under `video_id` is replaced.
    ///
    /// # Errors
    ///
    /// Probing errors, or [`PlayheadError::ManagerShutDown`] after
    /// [`shutdown`](Self::shutdown).
    pub fn start_session_with_id(
        &self,
        video_id: VideoId,
        path: &Path,
    ) -> Result<VideoProgress, PlayheadError> {
        self.ensure_open()?;
        let metadata = self.metadata(path)?;

        let mut progress = VideoProgress::from_metadata(video_id, &metadata);
        progress.resume();
        let snapshot = progress.clone();
        {
            let mut registry = self.shared.registry.lock();
            if registry.closed {
                return Err(PlayheadError::ManagerShutDown);
            }
            if registry.entries.contains_key(snapshot.video_id()) {
                log::debug!("Replacing session {}", snapshot.video_id());
            }
            registry.insert(progress);
        }
        self.ensure_clock()?;

        log::info!(
            "Started session {} for {} ({})",
            snapshot.video_id(),
            path.display(),
            snapshot.formatted_duration()
        );
        self.shared
            .notify(&[PlaybackEvent::Started(snapshot.clone())]);
        Ok(snapshot)
    }

    /// Pause a session. `None` if it is not registered.
    pub fn pause(&self, video_id: &VideoId) -> Option<VideoProgress> {
        self.shared
            .update(video_id, |progress| {
                progress.pause();
                PlaybackEvent::Paused(progress.clone())
            })
    }

    /// Resume a paused session. `None` if it is not registered.
    pub fn resume(&self, video_id: &VideoId) -> Option<VideoProgress> {
        self.shared
            .update(video_id, |progress| {
                progress.resume();
                PlaybackEvent::Resumed(progress.clone())
            })
    }

    /// Move a session to `seconds`, clamped to the video. `None` if it is
    /// not registered.
    pub fn seek(&self, video_id: &VideoId, seconds: f64) -> Option<VideoProgress> {
        self.shared
            .update(video_id, |progress| {
                let from_seconds = progress.seek(seconds);
                PlaybackEvent::Seek {
                    progress: progress.clone(),
                    from_seconds,
                    to_seconds: progress.current_time_seconds(),
                }
            })
    }

    /// Snapshot of one session.
    pub fn progress(&self, video_id: &VideoId) -> Option<VideoProgress> {
        self.shared
            .registry
            .lock()
            .entries
            .get(video_id)
            .map(|entry| entry.progress.clone())
    }

    /// Snapshots of every registered tracker, ordered by identifier.
    ///
    /// Includes trackers of managed downloads that are still in flight.
    pub fn active_sessions(&self) -> Vec<VideoProgress> {
        let mut sessions: Vec<VideoProgress> = self
            .shared
            .registry
            .lock()
            .entries
            .values()
            .map(|entry| entry.progress.clone())
            .collect();
        sessions.sort_by(|a, b| a.video_id().cmp(b.video_id()));
        sessions
    }

    /// Write the frame at the session's current position as a default JPEG.
    pub fn extract_frame_at_current_position(
        &self,
        video_id: &VideoId,
        output: &Path,
    ) -> Result<VideoFrame, PlayheadError> {
        self.extract_frame_at_current_position_with_options(
            video_id,
            output,
            &FrameOptions::default(),
        )
    }

    /// Write the frame at the session's current position.
    ///
    /// # Errors
    ///
    /// [`PlayheadError::NoActiveSession`] when `video_id` is not registered,
    /// otherwise probing or extraction errors.
    pub fn extract_frame_at_current_position_with_options(
        &self,
        video_id: &VideoId,
        output: &Path,
        options: &FrameOptions,
    ) -> Result<VideoFrame, PlayheadError> {
        let snapshot = self
            .progress(video_id)
            .ok_or_else(|| PlayheadError::NoActiveSession(video_id.clone()))?;
        let metadata = self.metadata(snapshot.source())?;
        self.extractor.frame_with_metadata(
            video_id.as_str(),
            &metadata,
            snapshot.current_time_seconds(),
            output,
            options,
        )
    }

    /// Remove a session. Returns its last snapshot, or `None` if it was not
    /// registered.
    pub fn stop(&self, video_id: &VideoId) -> Option<VideoProgress> {
        let removed = self
            .shared
            .registry
            .lock()
            .entries
            .remove(video_id)
            .map(|entry| entry.progress);
        if let Some(progress) = &removed {
            log::info!(
                "Stopped session {} at {}",
                video_id,
                progress.formatted_current_time()
            );
            self.shared
                .notify(&[PlaybackEvent::Stopped(progress.clone())]);
        }
        removed
    }

    /// Download `url` to `destination`, then probe the finished file.
    ///
    /// While the transfer runs, a paused tracker without metadata is
    /// registered under [`VideoId::from_path`] of the destination and every
    /// progress report is forwarded to `on_progress`. The tracker is removed
    /// when the download ends, whether it succeeded or not, unless a session
    /// has been started under the same identifier in the meantime.
    pub fn download_with_progress<F>(
        &self,
        url: &str,
        destination: &Path,
        on_progress: F,
    ) -> Result<VideoMetadata, PlayheadError>
    where
        F: Fn(&DownloadProgress) + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let request = DownloadRequest::new(url, destination)?;
        let video_id = VideoId::from_path(destination);

        let generation = self
            .shared
            .registry
            .lock()
            .insert(VideoProgress::pending(video_id.clone(), destination));

        let forward_id = video_id.clone();
        let forward = move |info: &ProgressInfo| {
            on_progress(&DownloadProgress {
                video_id: forward_id.clone(),
                bytes_downloaded: info.current,
                total_bytes: info.total,
                percentage: info.percentage.unwrap_or(0.0),
            });
        };

        let result = self
            .downloader
            .download_with_progress(&request, Arc::new(forward))
            .and_then(|bytes| {
                log::debug!("Probing {} after {} bytes", destination.display(), bytes);
                self.metadata(destination)
            });

        let mut registry = self.shared.registry.lock();
        if registry
            .entries
            .get(&video_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            registry.entries.remove(&video_id);
        }
        result
    }

    /// Probe `path` and write a thumbnail plus five previews into
    /// `directory`.
    pub fn create_summary(
        &self,
        path: &Path,
        directory: &Path,
    ) -> Result<VideoSummary, PlayheadError> {
        let metadata = self.metadata(path)?;
        ThumbnailHandle::summary(&self.extractor, &metadata, directory)
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shared.registry.lock().closed
    }

    /// Stop the clock and drop every session and cached entry.
    ///
    /// Waits up to [`SessionOptions::shutdown_grace`] for a tick in progress
    /// to finish, then aborts the clock task. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut registry = self.shared.registry.lock();
            if registry.closed {
                return;
            }
            registry.closed = true;
        }

        if let Some(clock) = self.clock.lock().take() {
            // The task may already be gone if the runtime is shutting down.
            let _ = clock.stop.send(());
            match clock.finished.recv_timeout(self.options.shutdown_grace) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    log::warn!(
                        "Clock did not stop within {:?}; aborting it",
                        self.options.shutdown_grace
                    );
                    clock.handle.abort();
                }
            }
        }

        let sessions = {
            let mut registry = self.shared.registry.lock();
            let count = registry.entries.len();
            registry.entries.clear();
            count
        };
        self.cache.clear();
        log::info!("Session manager shut down ({sessions} sessions dropped)");
    }

    fn ensure_open(&self) -> Result<(), PlayheadError> {
        if self.is_shut_down() {
            return Err(PlayheadError::ManagerShutDown);
        }
        Ok(())
    }

    fn ensure_clock(&self) -> Result<(), PlayheadError> {
        let mut clock = self.clock.lock();
        if clock.is_some() {
            return Ok(());
        }
        self.ensure_open()?;
        let runtime = self
            .runtime
            .as_ref()
            .ok_or(PlayheadError::ManagerShutDown)?;

        let (stop, mut stop_signal) = oneshot::channel::<()>();
        let (finished_tx, finished) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let interval = self.options.tick_interval.max(MIN_TICK_INTERVAL);
        let step = self.options.tick_step_seconds;

        log::debug!("Starting clock (interval={interval:?}, step={step}s)");
        let handle = runtime.spawn(async move {
            // Dropped when the task ends, which disconnects `finished`.
            let _finished = finished_tx;
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_signal => break,
                    _ = ticker.tick() => shared.tick(step),
                }
            }
        });

        *clock = Some(Clock {
            stop,
            finished,
            handle,
        });
        Ok(())
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
