//! Cached metadata probing.
//!
//! Probing spawns a subprocess, so [`MetadataCache`] remembers the result per
//! path. An entry is only reused while the file still has the size it had
//! when it was probed; a resumed or replaced download changes the size and
//! forces a fresh probe.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::PlayheadError;
use crate::ffmpeg::MediaToolkit;
use crate::metadata::VideoMetadata;

/// Thread-safe map from file path to its last probed metadata.
///
/// # Example
///
/// ```no_run
/// use playhead::{FfmpegToolkit, MetadataCache};
///
/// let toolkit = FfmpegToolkit::default();
/// let cache = MetadataCache::new();
/// let first = cache.get_or_probe(&toolkit, "input.mp4".as_ref())?;
/// // Served from the cache while the file size is unchanged.
/// let second = cache.get_or_probe(&toolkit, "input.mp4".as_ref())?;
/// assert_eq!(first.extracted_at, second.extracted_at);
/// # Ok::<(), playhead::PlayheadError>(())
/// ```
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: Mutex<HashMap<PathBuf, VideoMetadata>>,
}

impl MetadataCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return cached metadata for `path` if its size still matches, probing
    /// through `toolkit` otherwise.
    ///
    /// The lock is not held while the probe runs, so concurrent callers may
    /// probe the same file twice; the later result wins.
    pub fn get_or_probe(
        &self,
        toolkit: &dyn MediaToolkit,
        path: &Path,
    ) -> Result<VideoMetadata, PlayheadError> {
        let key = path.to_path_buf();

        if let Some(cached) = self.entries.lock().get(&key).cloned() {
            match fs::metadata(path) {
                Ok(current) if current.len() == cached.file_size_bytes => {
                    log::debug!("Metadata cache hit for {}", path.display());
                    return Ok(cached);
                }
                Ok(_) => {
                    log::debug!("{} changed size; probing again", path.display());
                }
                Err(_) => {
                    self.entries.lock().remove(&key);
                }
            }
        }

        let metadata = toolkit.probe(path)?;
        self.entries.lock().insert(key, metadata.clone());
        Ok(metadata)
    }

    /// Drop the entry for `path`.
    pub fn invalidate(&self, path: &Path) -> Option<VideoMetadata> {
        self.entries.lock().remove(path)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
