//! Resumable HTTP downloads.
//!
//! [`HttpDownloader`] streams a remote file to disk in fixed-size chunks.
//! When resuming, it asks the server for the missing tail with a
//! `Range: bytes=N-` header and appends to the partial file. Servers that
//! ignore the header answer `200 OK` with the whole body; that case is
//! detected and the file is rewritten from scratch instead of being
//! concatenated.
//!
//! # Example
//!
//! ```no_run
//! use playhead::{DownloadOptions, DownloadRequest, HttpDownloader, VideoDownloader};
//!
//! let request = DownloadRequest::builder()
//!     .url("https://example.com/video.mp4")
//!     .destination("target/video.mp4")
//!     .resume(true)
//!     .build()?;
//!
//! let bytes_on_disk = HttpDownloader::new(DownloadOptions::new()).download(&request)?;
//! println!("{bytes_on_disk} bytes");
//! # Ok::<(), playhead::PlayheadError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ureq::{Agent, AgentBuilder};
use url::Url;

use crate::config::DownloadOptions;
use crate::error::PlayheadError;
use crate::progress::{OperationType, ProgressCallback, ProgressTracker};

const HTTP_OK: u16 = 200;
const HTTP_PARTIAL_CONTENT: u16 = 206;
const MAX_REDIRECTS: u32 = 8;

/// A validated download job: source URL, destination file, resume flag.
///
/// Immutable once built. Construct through [`DownloadRequest::builder`] or
/// [`DownloadRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: Url,
    destination: PathBuf,
    resume: bool,
}

impl DownloadRequest {
    /// Start building a request. `resume` defaults to `true`.
    pub fn builder() -> DownloadRequestBuilder {
        DownloadRequestBuilder::default()
    }

    /// Build a resuming request in one call.
    ///
    /// # Errors
    ///
    /// Returns [`PlayheadError::InvalidRequest`] for a blank or non-HTTP URL
    /// or an empty destination.
    pub fn new(url: &str, destination: impl Into<PathBuf>) -> Result<Self, PlayheadError> {
        Self::builder().url(url).destination(destination).build()
    }

    /// Source URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Destination file.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Whether an existing destination is continued rather than replaced.
    pub fn resume(&self) -> bool {
        self.resume
    }
}

/// Builder for [`DownloadRequest`].
#[derive(Debug, Clone)]
#[must_use]
pub struct DownloadRequestBuilder {
    url: Option<String>,
    destination: Option<PathBuf>,
    resume: bool,
}

impl Default for DownloadRequestBuilder {
    fn default() -> Self {
        Self {
            url: None,
            destination: None,
            resume: true,
        }
    }
}

impl DownloadRequestBuilder {
    /// Set the source URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the destination file.
    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Continue a partial destination file instead of replacing it.
    pub fn resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Validate and build the request. No I/O happens here.
    ///
    /// # Errors
    ///
    /// Returns [`PlayheadError::InvalidRequest`] when the URL is missing,
    /// blank, unparsable, or not `http`/`https`, or when the destination is
    /// missing or empty.
    pub fn build(self) -> Result<DownloadRequest, PlayheadError> {
        let raw_url = self
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| PlayheadError::InvalidRequest("url must not be blank".to_string()))?;

        let url = Url::parse(raw_url.trim())
            .map_err(|error| PlayheadError::InvalidRequest(format!("{raw_url}: {error}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PlayheadError::InvalidRequest(format!(
                "unsupported scheme `{}`",
                url.scheme()
            )));
        }

        let destination = self
            .destination
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| {
                PlayheadError::InvalidRequest("destination must not be empty".to_string())
            })?;

        Ok(DownloadRequest {
            url,
            destination,
            resume: self.resume,
        })
    }
}

/// Something that can fetch a [`DownloadRequest`] to disk.
///
/// Implementations block the calling thread for the whole transfer.
pub trait VideoDownloader: Send + Sync {
    /// Download using the implementation's configured progress callback.
    ///
    /// Returns the total bytes on disk after completion, including bytes
    /// that existed before a resumed download.
    fn download(&self, request: &DownloadRequest) -> Result<u64, PlayheadError>;

    /// Download, reporting progress to `progress` instead of the configured
    /// callback.
    fn download_with_progress(
        &self,
        request: &DownloadRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<u64, PlayheadError>;
}

/// Blocking HTTP downloader with resume support.
///
/// One [`ureq::Agent`] is shared by all downloads made through this value,
/// so connections are pooled between calls.
pub struct HttpDownloader {
    agent: Agent,
    options: DownloadOptions,
}

impl std::fmt::Debug for HttpDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownloader")
            .field("options", &self.options)
            .finish()
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(DownloadOptions::default())
    }
}

impl HttpDownloader {
    /// Create a downloader with the given timeouts, buffer size, and callbacks.
    pub fn new(options: DownloadOptions) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(options.connect_timeout)
            .timeout_read(options.read_timeout)
            .user_agent(&options.user_agent)
            .redirects(MAX_REDIRECTS)
            .build();
        Self { agent, options }
    }

    /// The options this downloader was built with.
    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    fn transfer(
        &self,
        request: &DownloadRequest,
        progress: Option<Arc<dyn ProgressCallback>>,
    ) -> Result<u64, PlayheadError> {
        let destination = request.destination();
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut existing_bytes = if request.resume() {
            match fs::metadata(destination) {
                Ok(metadata) if metadata.is_file() => metadata.len(),
                _ => 0,
            }
        } else {
            0
        };

        log::debug!(
            "Downloading {} to {} (resume={}, existing_bytes={})",
            request.url(),
            destination.display(),
            request.resume(),
            existing_bytes
        );

        let mut call = self.agent.get(request.url().as_str());
        if existing_bytes > 0 {
            call = call.set("Range", &format!("bytes={existing_bytes}-"));
        }
        let response = call.call()?;

        match response.status() {
            HTTP_PARTIAL_CONTENT => {}
            HTTP_OK if existing_bytes > 0 => {
                log::warn!(
                    "Server ignored range request for {}; restarting from byte 0",
                    request.url()
                );
                existing_bytes = 0;
            }
            HTTP_OK => {}
            status => {
                return Err(PlayheadError::HttpStatus {
                    status,
                    url: request.url().to_string(),
                });
            }
        }

        let content_length = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok());
        let total_expected = content_length.map(|length| existing_bytes + length);

        let file = if existing_bytes > 0 {
            OpenOptions::new().append(true).open(destination)?
        } else {
            File::create(destination)?
        };
        let mut writer = BufWriter::with_capacity(self.options.buffer_size, file);
        let mut reader = response.into_reader();

        let mut tracker = progress.map(|callback| {
            ProgressTracker::new(
                callback,
                OperationType::Download,
                total_expected,
                existing_bytes,
                self.options.progress_interval,
            )
        });

        let mut buffer = vec![0_u8; self.options.buffer_size];
        let mut total_bytes = existing_bytes;

        loop {
            if self.options.is_cancelled() {
                writer.flush()?;
                log::info!(
                    "Download of {} cancelled at {} bytes",
                    request.url(),
                    total_bytes
                );
                return Err(PlayheadError::Cancelled);
            }

            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(error) if error.kind() == IoErrorKind::Interrupted => continue,
                Err(error) => {
                    // Keep what arrived so far; the next resume picks it up.
                    writer.flush()?;
                    return Err(PlayheadError::Transport(format!(
                        "connection dropped after {total_bytes} bytes: {error}"
                    )));
                }
            };

            writer.write_all(&buffer[..read])?;
            total_bytes += read as u64;

            if let Some(tracker) = tracker.as_mut() {
                tracker.advance_by(read as u64);
            }
        }

        writer.flush()?;

        if let Some(tracker) = tracker.as_mut() {
            tracker.finish();
        }

        log::info!(
            "Downloaded {} bytes to {}",
            total_bytes,
            destination.display()
        );
        Ok(total_bytes)
    }
}

impl VideoDownloader for HttpDownloader {
    fn download(&self, request: &DownloadRequest) -> Result<u64, PlayheadError> {
        self.transfer(request, self.options.progress.clone())
    }

    fn download_with_progress(
        &self,
        request: &DownloadRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<u64, PlayheadError> {
        self.transfer(request, Some(progress))
    }
}
