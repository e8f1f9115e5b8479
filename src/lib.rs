//! Streaming reader for tshark JSON export files.
//!
//! `sharkjson` decodes the JSON document produced by `tshark -T json` - an
//! array of per-packet frame records, each carrying a nested tree of
//! protocol-field layers - incrementally, without ever buffering the whole
//! document.
//!
//! # Features
//!
//! - **Bounded memory**: one buffered record plus one decoded frame in
//!   flight, regardless of capture size
//! - **Transparent decompression**: gzipped exports are detected and
//!   decompressed on the fly
//! - **Name interning**: the millions of repeated field names in a large
//!   capture share a single allocation each
//! - **Pull or stream**: a blocking `advance()`/`current()` cursor, or a
//!   `futures::Stream` of frames
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sharkjson::Sharkjson;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> sharkjson::Result<()> {
//!     let mut reader = Sharkjson::open("capture.json").await?;
//!     while reader.advance().await {
//!         if let Some(frame) = reader.current() {
//!             println!("#{}: {} layers", frame.number, frame.layers.len());
//!         }
//!     }
//!     if let Some(err) = reader.last_error() {
//!         eprintln!("stream failed: {err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Input format
//!
//! The boundary scanner relies on tshark's fixed two-space pretty-printing
//! (each frame object opens on a `"  {"` line and closes on a `"  }"` line).
//! That convention is load-bearing: an export reformatted by another tool
//! will fail with a marker error. See [`scanner`] for details.

// Core types and error handling
mod error;
pub mod intern;
pub mod types;

// Scanning and decoding
pub mod decoder;
pub mod scanner;
pub mod source;

// Stream-based producer/consumer architecture
pub mod driver;
pub mod provider;
pub mod providers;
mod reader;

// Core exports
pub use error::{ExportError, Result};
pub use intern::{Interner, NameHandle, WellKnownNames};
pub use types::{FieldBody, FieldNode, Frame};

// Pipeline exports
pub use decoder::FrameDecoder;
pub use reader::{ExportOptions, ExportReader};
pub use scanner::{DEFAULT_MAX_TOKEN_SIZE, FrameScanner};
pub use source::ExportSource;

/// Unified entry point for export streams.
///
/// A thin factory over [`ExportReader`], mirroring the common
/// open-then-iterate shape:
///
/// ```rust,no_run
/// use sharkjson::Sharkjson;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> sharkjson::Result<()> {
/// let mut reader = Sharkjson::open("capture.json.gz").await?;
/// while reader.advance().await {
///     // ...
/// }
/// # Ok(())
/// # }
/// ```
pub struct Sharkjson;

impl Sharkjson {
    /// Open an export file (raw or gzipped) for streaming.
    pub async fn open<P: AsRef<std::path::Path>>(path: P) -> Result<ExportReader> {
        ExportReader::open(path).await
    }

    /// Open an export file with explicit options.
    pub async fn open_with<P: AsRef<std::path::Path>>(
        path: P,
        options: ExportOptions,
    ) -> Result<ExportReader> {
        ExportReader::open_with(path, options).await
    }
}
