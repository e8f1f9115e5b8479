//! Decoded frame records.

use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::FieldNode;

/// One decoded packet record.
///
/// This is the fundamental data unit that flows through the pipeline. A frame
/// owns its field tree exclusively; once handed to a consumer it is immutable
/// and the producer never touches it again.
///
/// The metadata fields are extracted from the first layer when it is the
/// well-known `frame` layer; a capture without one (or with some of its
/// fields absent) leaves the corresponding attributes at their zero values.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Sequence number within the capture.
    pub number: u64,

    /// Absolute capture time.
    pub time: SystemTime,

    /// Capture time as raw decimal seconds since the epoch, as exported.
    pub time_epoch: f64,

    /// Time relative to the start of the capture.
    pub time_relative: Duration,

    /// Wire length in bytes.
    pub len: u64,

    /// Top-level protocol layers in document order.
    pub layers: Vec<FieldNode>,

    #[serde(skip)]
    raw: Box<[u8]>,
}

impl Frame {
    pub(crate) fn new(layers: Vec<FieldNode>, raw: Box<[u8]>) -> Self {
        Self {
            number: 0,
            time: UNIX_EPOCH,
            time_epoch: 0.0,
            time_relative: Duration::ZERO,
            len: 0,
            layers,
            raw,
        }
    }

    /// The frame's own copy of the JSON text it was decoded from.
    pub fn raw_json(&self) -> &[u8] {
        &self.raw
    }

    /// Write the record in the text dump format: metadata lines followed by
    /// every layer's indented field tree.
    pub fn dump<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "Number: {}", self.number)?;
        writeln!(
            w,
            "Time: {}",
            DateTime::<Utc>::from(self.time).to_rfc3339_opts(SecondsFormat::Nanos, true)
        )?;
        writeln!(w, "TimeRelative: {:?}", self.time_relative)?;
        writeln!(w, "Len: {}", self.len)?;
        for layer in &self.layers {
            layer.dump(w)?;
        }
        Ok(())
    }
}
