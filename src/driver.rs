//! Driver spawns and manages the frame producer task.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::ExportError;
use crate::provider::Provider;
use crate::types::Frame;

/// Result of spawning the producer task.
pub struct DriverChannels {
    /// Capacity-one handoff carrying decoded frames in source order.
    pub frames: mpsc::Receiver<Frame>,
    /// Latched terminal error; stays `None` for a clean end of stream.
    pub error: watch::Receiver<Option<Arc<ExportError>>>,
    /// Cancellation token for early abandonment.
    pub cancel: CancellationToken,
    /// Handle to the producer task, for callers that await shutdown.
    pub task: JoinHandle<()>,
}

/// Driver spawns exactly one producer task that owns the provider.
///
/// The handoff channel has capacity one, so the producer can be at most one
/// decoded frame ahead of the consumer: working memory stays bounded by one
/// buffered record plus one decoded frame no matter how large the document
/// is, and source order is preserved because there is only the one producer.
pub struct Driver;

impl Driver {
    /// Spawn the producer task for the given provider.
    pub fn spawn<P>(provider: P) -> DriverChannels
    where
        P: Provider,
    {
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = watch::channel(None);
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        let task = tokio::spawn(async move {
            Self::producer_task(provider, frame_tx, error_tx, cancel_task).await;
        });

        DriverChannels { frames: frame_rx, error: error_rx, cancel, task }
    }

    /// Producer task - scans, decodes, and hands frames to the consumer.
    async fn producer_task<P>(
        mut provider: P,
        frame_tx: mpsc::Sender<Frame>,
        error_tx: watch::Sender<Option<Arc<ExportError>>>,
        cancel: CancellationToken,
    ) where
        P: Provider,
    {
        info!("Frame producer started");
        let mut frame_count = 0u64;

        loop {
            if cancel.is_cancelled() {
                info!("Frame producer cancelled");
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Frame producer cancelled between frames");
                    break;
                }
                result = provider.next_frame() => result,
            };

            match result {
                Ok(Some(frame)) => {
                    frame_count += 1;
                    trace!("Frame {}: number={}", frame_count, frame.number);

                    // Rendezvous: wait here until the consumer has taken the
                    // previous frame (or has gone away).
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Frame producer cancelled during handoff");
                            break;
                        }
                        sent = frame_tx.send(frame) => {
                            if sent.is_err() {
                                debug!("Frame receiver dropped, shutting down");
                                break;
                            }
                        }
                    }
                }
                Ok(None) => {
                    info!("Export stream ended after {} frames", frame_count);
                    break;
                }
                Err(e) => {
                    // First error wins and stops production for good; frames
                    // already delivered stay valid.
                    error!("Terminal stream error after {} frames: {}", frame_count, e);
                    let _ = error_tx.send(Some(Arc::new(e)));
                    break;
                }
            }
        }

        if let Err(e) = provider.close() {
            warn!("Failed to close export source: {}", e);
            error_tx.send_if_modified(|latched| {
                if latched.is_none() {
                    *latched = Some(Arc::new(e));
                    true
                } else {
                    false
                }
            });
        }

        debug!("Frame producer ended ({} frames produced)", frame_count);
    }
}
