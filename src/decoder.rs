//! Frame decoder: one scanner token into one [`Frame`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use tracing::trace;

use crate::error::{ExportError, Result};
use crate::intern::{Interner, NameHandle};
use crate::types::{FieldNode, Frame};

/// Decodes one self-contained frame record.
///
/// Holds the interner that canonicalizes every field and layer name; a
/// decoder may share its interner with other pipelines.
pub struct FrameDecoder {
    interner: Arc<Interner>,
}

impl FrameDecoder {
    pub fn new(interner: Arc<Interner>) -> Self {
        Self { interner }
    }

    pub fn interner(&self) -> &Arc<Interner> {
        &self.interner
    }

    /// Decode one record.
    ///
    /// The frame keeps its own copy of the bytes, so the caller's buffer may
    /// be reused immediately. A failed decode never yields a partially built
    /// frame.
    pub fn decode(&self, raw: &[u8]) -> Result<Frame> {
        let raw: Box<[u8]> = raw.into();

        let mut de = serde_json::Deserializer::from_slice(&raw);
        let layers = DocumentSeed { interner: &self.interner }
            .deserialize(&mut de)
            .and_then(|layers| de.end().map(|()| layers))
            .map_err(|e| ExportError::schema_error(e.to_string()))?;

        let mut frame = Frame::new(layers, raw);
        self.extract_frame_fields(&mut frame)?;
        trace!("Decoded frame {} with {} layers", frame.number, frame.layers.len());
        Ok(frame)
    }

    /// Pull the well-known metadata out of a leading `frame` layer.
    ///
    /// One pass over the layer's immediate children, matching by handle
    /// identity and stopping as soon as all four fields are seen. A field
    /// that is present but malformed fails the decode; an absent field keeps
    /// its zero value.
    fn extract_frame_fields(&self, frame: &mut Frame) -> Result<()> {
        let wk = self.interner.well_known();
        let Some(first) = frame.layers.first() else {
            return Ok(());
        };
        if *first.name() != wk.frame {
            return Ok(());
        }

        let mut remaining = 4u8;
        let mut number = frame.number;
        let mut len = frame.len;
        let mut time_epoch = frame.time_epoch;
        let mut time = frame.time;
        let mut time_relative = frame.time_relative;

        for child in first.children() {
            let name = child.name();
            if *name == wk.frame_time_epoch {
                let seconds = parse_seconds(name, child)?;
                time_epoch = seconds;
                time = UNIX_EPOCH + split_epoch(seconds);
            } else if *name == wk.frame_time_relative {
                let seconds = parse_seconds(name, child)?;
                time_relative = Duration::try_from_secs_f64(seconds)
                    .map_err(|e| ExportError::field_error(name.as_str(), e.to_string()))?;
            } else if *name == wk.frame_number {
                number = parse_u64(name, child)?;
            } else if *name == wk.frame_len {
                len = parse_u64(name, child)?;
            } else {
                continue;
            }
            // A repeated name decrements again; saturate rather than underflow.
            remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                break;
            }
        }

        frame.number = number;
        frame.len = len;
        frame.time_epoch = time_epoch;
        frame.time = time;
        frame.time_relative = time_relative;
        Ok(())
    }
}

fn leaf_value<'a>(name: &NameHandle, node: &'a FieldNode) -> Result<&'a str> {
    node.value()
        .ok_or_else(|| ExportError::field_error(name.as_str(), "expected a string value"))
}

fn parse_seconds(name: &NameHandle, node: &FieldNode) -> Result<f64> {
    let value = leaf_value(name, node)?;
    let seconds: f64 = value
        .parse()
        .map_err(|e: std::num::ParseFloatError| ExportError::field_error(name.as_str(), e.to_string()))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ExportError::field_error(name.as_str(), format!("out of range: {value}")));
    }
    Ok(seconds)
}

/// Whole seconds plus the *truncated* nanosecond remainder.
fn split_epoch(seconds: f64) -> Duration {
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1_000_000_000.0) as u32;
    Duration::new(whole as u64, nanos.min(999_999_999))
}

fn parse_u64(name: &NameHandle, node: &FieldNode) -> Result<u64> {
    let value = leaf_value(name, node)?;
    value
        .parse()
        .map_err(|e: std::num::ParseIntError| ExportError::field_error(name.as_str(), e.to_string()))
}

/// Walks the outer record object down to `_source.layers`; everything else
/// in the record is ignored.
struct DocumentSeed<'a> {
    interner: &'a Interner,
}

impl<'de> DeserializeSeed<'de> for DocumentSeed<'_> {
    type Value = Vec<FieldNode>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DocumentSeed<'_> {
    type Value = Vec<FieldNode>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a frame record object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut layers = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "_source" && layers.is_none() {
                layers = map.next_value_seed(SourceSeed { interner: self.interner })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        layers.ok_or_else(|| de::Error::custom("missing _source.layers object"))
    }
}

struct SourceSeed<'a> {
    interner: &'a Interner,
}

impl<'de> DeserializeSeed<'de> for SourceSeed<'_> {
    type Value = Option<Vec<FieldNode>>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for SourceSeed<'_> {
    type Value = Option<Vec<FieldNode>>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a _source object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut layers = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == "layers" && layers.is_none() {
                layers = Some(map.next_value_seed(TreeSeed { interner: self.interner })?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(layers)
    }
}

/// Builds the children of one JSON object as field nodes, in document order.
struct TreeSeed<'a> {
    interner: &'a Interner,
}

impl<'de> DeserializeSeed<'de> for TreeSeed<'_> {
    type Value = Vec<FieldNode>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for TreeSeed<'_> {
    type Value = Vec<FieldNode>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of protocol fields")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut nodes = Vec::new();
        while let Some(name) = map.next_key_seed(InternSeed { interner: self.interner })? {
            let node = map.next_value_seed(NodeSeed { interner: self.interner, name })?;
            nodes.push(node);
        }
        Ok(nodes)
    }
}

/// Interns a map key without an intermediate allocation.
struct InternSeed<'a> {
    interner: &'a Interner,
}

impl<'de> DeserializeSeed<'de> for InternSeed<'_> {
    type Value = NameHandle;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for InternSeed<'_> {
    type Value = NameHandle;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a field name")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(self.interner.intern(v))
    }
}

/// One field value: a JSON string becomes a leaf, a JSON object an internal
/// node. Every other value kind is rejected, naming the offending field.
struct NodeSeed<'a> {
    interner: &'a Interner,
    name: NameHandle,
}

impl<'de> DeserializeSeed<'de> for NodeSeed<'_> {
    type Value = FieldNode;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for NodeSeed<'_> {
    type Value = FieldNode;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a string or object for field \"{}\"", self.name)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(FieldNode::leaf(self.name, v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(FieldNode::leaf(self.name, v))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        let children = TreeSeed { interner: self.interner }.visit_map(map)?;
        Ok(FieldNode::internal(self.name, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn decoder() -> FrameDecoder {
        FrameDecoder::new(Arc::new(Interner::new()))
    }

    fn record(layers_body: &str) -> String {
        format!(r#"{{"_source": {{"layers": {layers_body}}}}}"#)
    }

    #[test]
    fn decodes_well_known_frame_fields() {
        let raw = record(
            r#"{"frame": {"frame.number": "42", "frame.len": "100",
                "frame.time_epoch": "1000.250000000",
                "frame.time_relative": "0.100000000"}}"#,
        );
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        assert_eq!(frame.number, 42);
        assert_eq!(frame.len, 100);
        assert_eq!(frame.time, UNIX_EPOCH + Duration::new(1000, 250_000_000));
        assert_eq!(frame.time_relative, Duration::from_millis(100));
        assert_eq!(frame.time_epoch, 1000.25);
    }

    #[test]
    fn epoch_nanoseconds_are_truncated_not_rounded() {
        let raw = record(r#"{"frame": {"frame.time_epoch": "5.999999999"}}"#);
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        let offset = frame.time.duration_since(UNIX_EPOCH).unwrap();
        assert_eq!(offset.as_secs(), 5);
        assert!(offset.subsec_nanos() <= 999_999_999);
        assert!(offset.subsec_nanos() >= 999_999_000);
    }

    #[test]
    fn absent_well_known_fields_stay_zero() {
        let raw = record(r#"{"frame": {"frame.number": "7"}}"#);
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        assert_eq!(frame.number, 7);
        assert_eq!(frame.len, 0);
        assert_eq!(frame.time, SystemTime::UNIX_EPOCH);
        assert_eq!(frame.time_relative, Duration::ZERO);
    }

    #[test]
    fn non_frame_first_layer_skips_extraction() {
        let raw = record(r#"{"eth": {"frame.number": "9"}}"#);
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        assert_eq!(frame.number, 0);
        assert_eq!(frame.layers.len(), 1);
    }

    #[test]
    fn nested_objects_preserve_depth_and_order() {
        let raw = record(
            r#"{"ip": {"ip.version": "4", "ip.flags_tree": {"ip.flags.df": "1"}},
                "tcp": {"tcp.port": "443"}}"#,
        );
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        assert_eq!(frame.layers.len(), 2);

        let ip = &frame.layers[0];
        assert_eq!(ip.name().as_str(), "ip");
        assert_eq!(ip.children()[0].value(), Some("4"));

        let flags = &ip.children()[1];
        assert!(!flags.is_leaf());
        let grandchild = &flags.children()[0];
        assert_eq!(grandchild.name().as_str(), "ip.flags.df");
        assert_eq!(grandchild.value(), Some("1"));
    }

    #[test]
    fn string_layer_is_a_leaf() {
        let raw = record(r#"{"frame.comment": "hand-written note"}"#);
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        assert_eq!(frame.layers[0].value(), Some("hand-written note"));
    }

    #[test]
    fn missing_source_layers_is_a_schema_error() {
        for raw in [r#"{}"#, r#"{"_source": {}}"#, r#"{"other": {"layers": {}}}"#] {
            let err = decoder().decode(raw.as_bytes()).unwrap_err();
            assert!(matches!(err, ExportError::Schema { .. }), "input: {raw}");
        }
    }

    #[test]
    fn disallowed_value_kinds_name_the_offending_field() {
        for (raw, field) in [
            (record(r#"{"ip": {"ip.len": 20}}"#), "ip.len"),
            (record(r#"{"ip": {"ip.opts": [1, 2]}}"#), "ip.opts"),
            (record(r#"{"ip": {"ip.checksum.good": true}}"#), "ip.checksum.good"),
            (record(r#"{"ip": {"ip.pad": null}}"#), "ip.pad"),
        ] {
            let err = decoder().decode(raw.as_bytes()).unwrap_err();
            match err {
                ExportError::Schema { details } => {
                    assert!(details.contains(field), "{details} should name {field}")
                }
                other => panic!("expected schema error, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_well_known_field_fails_the_decode() {
        for raw in [
            record(r#"{"frame": {"frame.number": "not-a-number"}}"#),
            record(r#"{"frame": {"frame.len": "-1"}}"#),
            record(r#"{"frame": {"frame.time_epoch": "bogus"}}"#),
            record(r#"{"frame": {"frame.time_relative": "-0.5"}}"#),
            record(r#"{"frame": {"frame.number": {"nested": "1"}}}"#),
        ] {
            let err = decoder().decode(raw.as_bytes()).unwrap_err();
            assert!(matches!(err, ExportError::Field { .. }), "input: {raw}");
        }
    }

    #[test]
    fn fields_outside_source_layers_are_ignored() {
        let raw = r#"{"_index": "packets-2024", "_type": "doc",
            "_source": {"extra": "x", "layers": {"eth": {"eth.type": "0x0800"}}},
            "_score": "1"}"#;
        let frame = decoder().decode(raw.as_bytes()).unwrap();
        assert_eq!(frame.layers.len(), 1);
        assert_eq!(frame.layers[0].name().as_str(), "eth");
    }

    #[test]
    fn frame_keeps_a_private_copy_of_the_token() {
        let raw = record(r#"{"eth": {"eth.type": "0x0800"}}"#);
        let mut buffer = raw.clone().into_bytes();
        let frame = decoder().decode(&buffer).unwrap();
        // Clobber the caller's buffer; the frame must be unaffected.
        buffer.iter_mut().for_each(|b| *b = 0);
        assert_eq!(frame.raw_json(), raw.as_bytes());
    }

    #[test]
    fn shared_interner_yields_identical_handles_across_decoders() {
        let interner = Arc::new(Interner::new());
        let a = FrameDecoder::new(Arc::clone(&interner));
        let b = FrameDecoder::new(Arc::clone(&interner));
        let raw = record(r#"{"eth": {"eth.type": "0x0800"}}"#);
        let fa = a.decode(raw.as_bytes()).unwrap();
        let fb = b.decode(raw.as_bytes()).unwrap();
        assert_eq!(fa.layers[0].name(), fb.layers[0].name());
    }
}
