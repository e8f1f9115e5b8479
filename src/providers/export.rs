//! Provider reading a tshark JSON export file.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::Result;
use crate::decoder::FrameDecoder;
use crate::intern::Interner;
use crate::provider::Provider;
use crate::scanner::FrameScanner;
use crate::source::ExportSource;
use crate::types::Frame;

/// Provider that scans and decodes an export file, one record per call.
///
/// Reads are ordinary blocking file I/O performed inline on the producer
/// task; the scanner buffers at most one record, so each call touches a
/// bounded amount of input.
pub struct ExportProvider {
    scanner: FrameScanner<ExportSource>,
    decoder: FrameDecoder,
    frames_produced: u64,
}

impl ExportProvider {
    /// Open `path` with the given token bound and interner.
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_token_size: usize,
        interner: Arc<Interner>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let source = ExportSource::open(path)?;
        info!(
            "Opened export file {} (compressed: {}, max token size: {})",
            path.display(),
            source.is_compressed(),
            max_token_size
        );

        Ok(Self {
            scanner: FrameScanner::with_max_token_size(source, max_token_size),
            decoder: FrameDecoder::new(interner),
            frames_produced: 0,
        })
    }

    /// Frames decoded so far.
    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }
}

#[async_trait::async_trait]
impl Provider for ExportProvider {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(token) = self.scanner.next_token()? else {
            debug!("Export stream exhausted after {} frames", self.frames_produced);
            return Ok(None);
        };
        let frame = self.decoder.decode(token)?;
        self.frames_produced += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) -> Result<()> {
        self.scanner.source_mut().close()
    }
}
