//! Async downloads.
//!
//! [`download_async`] runs a blocking [`VideoDownloader`] on Tokio's
//! blocking pool and hands back a [`DownloadFuture`], so a transfer can be
//! awaited without stalling the async runtime.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use playhead::{DownloadRequest, HttpDownloader, PlayheadError, download_async};
//!
//! # async fn example() -> Result<(), PlayheadError> {
//! let request = DownloadRequest::new("https://example.com/video.mp4", "video.mp4")?;
//! let bytes = download_async(Arc::new(HttpDownloader::default()), request).await?;
//! println!("{bytes} bytes on disk");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::download::{DownloadRequest, VideoDownloader};
use crate::error::PlayheadError;

/// A future that resolves to the number of bytes on disk once a download
/// finishes.
///
/// The transfer itself runs on a blocking thread; dropping the future does
/// not stop it. Use a [`CancellationToken`](crate::CancellationToken) in the
/// downloader's options for that.
pub struct DownloadFuture {
    handle: JoinHandle<Result<u64, PlayheadError>>,
}

impl Future for DownloadFuture {
    type Output = Result<u64, PlayheadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| {
            joined.unwrap_or_else(|error| {
                if error.is_cancelled() {
                    Err(PlayheadError::Cancelled)
                } else {
                    Err(PlayheadError::Transport(format!("download task failed: {error}")))
                }
            })
        })
    }
}

/// Start `request` on Tokio's blocking pool.
///
/// Must be called from within a Tokio runtime.
pub fn download_async(
    downloader: Arc<dyn VideoDownloader>,
    request: DownloadRequest,
) -> DownloadFuture {
    log::debug!("Spawning async download of {}", request.url());
    let handle = tokio::task::spawn_blocking(move || downloader.download(&request));
    DownloadFuture { handle }
}
