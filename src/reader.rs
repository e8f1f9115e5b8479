//! Pull-based reader over a streamed export file.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::ExportError;
use crate::intern::Interner;
use crate::providers::export::ExportProvider;
use crate::scanner::DEFAULT_MAX_TOKEN_SIZE;
use crate::types::Frame;
use crate::Result;

/// Options for opening an export stream.
#[derive(Clone)]
pub struct ExportOptions {
    /// Upper bound on the size of one buffered record; a record that grows
    /// past it fails the stream rather than the process's memory.
    pub max_token_size: usize,

    /// Interner to canonicalize names with. Share one across readers to pool
    /// their name tables; `None` gives the reader its own.
    pub interner: Option<Arc<Interner>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { max_token_size: DEFAULT_MAX_TOKEN_SIZE, interner: None }
    }
}

/// Streaming reader over a tshark JSON export file.
///
/// Scanning and decoding run on a background producer task; the reader pulls
/// decoded [`Frame`]s from it one at a time, in source order. The producer
/// stays at most one frame ahead, so memory use is independent of document
/// size.
///
/// Dropping the reader cancels the producer; [`ExportReader::close`] does the
/// same but waits for it to finish shutting down.
///
/// ```rust,no_run
/// use sharkjson::ExportReader;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> sharkjson::Result<()> {
///     let mut reader = ExportReader::open("capture.json").await?;
///     while reader.advance().await {
///         if let Some(frame) = reader.current() {
///             println!("frame {} ({} bytes)", frame.number, frame.len);
///         }
///     }
///     if let Some(err) = reader.last_error() {
///         eprintln!("stream failed: {err}");
///     }
///     Ok(())
/// }
/// ```
pub struct ExportReader {
    frames: mpsc::Receiver<Frame>,
    error: watch::Receiver<Option<Arc<ExportError>>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    current: Option<Frame>,
}

impl ExportReader {
    /// Open an export file with default options.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ExportOptions::default()).await
    }

    /// Open an export file.
    pub async fn open_with<P: AsRef<Path>>(path: P, options: ExportOptions) -> Result<Self> {
        let path = path.as_ref();
        let interner = options.interner.unwrap_or_else(|| Arc::new(Interner::new()));
        let provider = ExportProvider::open(path, options.max_token_size, interner)?;
        let channels = Driver::spawn(provider);
        info!("Export reader started for {}", path.display());

        Ok(Self {
            frames: channels.frames,
            error: channels.error,
            cancel: channels.cancel,
            task: Some(channels.task),
            current: None,
        })
    }

    /// Wait for the next frame.
    ///
    /// Blocks until a frame is ready, the stream ends, or it fails. Returns
    /// `true` when a new frame became [`current`](Self::current); once it
    /// returns `false` it keeps returning `false`, and
    /// [`last_error`](Self::last_error) tells a clean end from a failure.
    pub async fn advance(&mut self) -> bool {
        match self.frames.recv().await {
            Some(frame) => {
                self.current = Some(frame);
                true
            }
            None => false,
        }
    }

    /// The frame made current by the last successful [`advance`](Self::advance).
    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    /// Take ownership of the current frame, leaving none current.
    pub fn take_current(&mut self) -> Option<Frame> {
        self.current.take()
    }

    /// The latched terminal error, if the stream stopped early.
    pub fn last_error(&self) -> Option<Arc<ExportError>> {
        self.error.borrow().clone()
    }

    /// Stop the producer task and release the byte source.
    ///
    /// Frames already delivered (including the current one) remain valid.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the producer to finish shutting down, then report
    /// the latched terminal error, if any.
    pub async fn close(mut self) -> Option<Arc<ExportError>> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                debug!("Producer task panicked during shutdown");
            }
        }
        self.error.borrow().clone()
    }
}

impl Drop for ExportReader {
    fn drop(&mut self) {
        debug!("Dropping export reader");
        // Cancel the producer on drop; failing to would leak the task and
        // the open descriptor when a consumer stops iterating early.
        self.cancel.cancel();
    }
}

/// Frames can also be consumed as a `futures::Stream`; items bypass
/// [`current`](ExportReader::current) and are moved to the caller directly.
impl Stream for ExportReader {
    type Item = Frame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().frames.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ExportOptions::default();
        assert_eq!(options.max_token_size, DEFAULT_MAX_TOKEN_SIZE);
        assert!(options.interner.is_none());
    }
}
