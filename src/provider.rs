//! Provider trait for frame sources.

use crate::Result;
use crate::types::Frame;

/// Trait for decoded-frame sources.
///
/// Providers abstract over where records come from (a file on disk, a
/// compressed file, an in-memory stream in tests) and are driven by the
/// background producer task, which owns them for their whole life.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next decoded frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - next frame, in source order
    /// - `Ok(None)` - stream cleanly exhausted
    /// - `Err(e)` - terminal error; the driver stops the stream
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying byte source.
    ///
    /// Called by the driver on every exit path (end of stream, error,
    /// cancellation, consumer gone). Close failures are aggregated, not
    /// swallowed.
    fn close(&mut self) -> Result<()>;
}
