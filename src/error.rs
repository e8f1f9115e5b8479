//! Error types for export stream processing.
//!
//! Every error is terminal for the stream it occurred on: the input is a
//! deterministic text stream, so a failure indicates corrupt or unsupported
//! input (or a too-small configured token bound), never a transient condition
//! worth retrying. Frames delivered before the failure remain valid.
//!
//! ## Error Categories
//!
//! - **I/O Errors**: open/read/close failures on the byte source
//! - **Malformed-Input Errors**: missing boundary markers, a truncated final
//!   record, or a record exceeding the configured token bound
//! - **Schema Errors**: missing `_source.layers`, or a disallowed JSON value
//!   kind inside a layer tree
//! - **Field Errors**: a well-known `frame` field that is present but does
//!   not parse as a number or duration

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for export stream operations.
pub type Result<T, E = ExportError> = std::result::Result<T, E>;

/// Main error type for export stream operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExportError {
    #[error("failed to open export file: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read export stream")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to close export source: {}", format_close_errors(.sources))]
    Close { sources: Vec<std::io::Error> },

    #[error("record incomplete at end of input ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    #[error("no record start marker before end-of-record marker")]
    MissingStartMarker,

    #[error("record exceeds maximum token size ({buffered} of {limit} bytes buffered)")]
    TokenTooLarge { limit: usize, buffered: usize },

    #[error("record schema error: {details}")]
    Schema { details: String },

    #[error("invalid value for field '{field}': {details}")]
    Field { field: String, details: String },
}

fn format_close_errors(sources: &[std::io::Error]) -> String {
    sources.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

impl ExportError {
    /// Helper constructor for open errors with path context.
    pub fn open_error(path: PathBuf, source: std::io::Error) -> Self {
        ExportError::Open { path, source }
    }

    /// Helper constructor for schema errors.
    pub fn schema_error(details: impl Into<String>) -> Self {
        ExportError::Schema { details: details.into() }
    }

    /// Helper constructor for field decode errors.
    pub fn field_error(field: impl Into<String>, details: impl Into<String>) -> Self {
        ExportError::Field { field: field.into(), details: details.into() }
    }

    /// Aggregate a set of close-time failures into one error.
    ///
    /// Returns `Ok(())` when the set is empty, otherwise all failures are
    /// reported together, not just the first.
    pub fn aggregate_close(sources: Vec<std::io::Error>) -> Result<()> {
        if sources.is_empty() { Ok(()) } else { Err(ExportError::Close { sources }) }
    }

    /// Whether this error came from the byte source rather than the input
    /// text itself.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            ExportError::Open { .. } | ExportError::Read { .. } | ExportError::Close { .. }
        )
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Read { source: err }
    }
}
