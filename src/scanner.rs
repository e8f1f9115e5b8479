//! Frame boundary scanner for tshark JSON export documents.
//!
//! The export is one huge JSON array of frame objects, far too large to
//! buffer. Rather than parse the document structurally, the scanner leans on
//! tshark's fixed two-space pretty-printing: every frame object opens on a
//! line reading `"  {"` and closes on a line reading `"  }"` (with a comma
//! between array siblings). Searching for those marker lines isolates one
//! complete, independently-parseable record at a time while holding at most
//! one record in memory.
//!
//! This is a deliberate fragility: the scanner breaks if upstream ever
//! reformats its output, and it will say so with a marker error instead of
//! guessing.

use std::io::Read;

use tracing::trace;

use crate::error::{ExportError, Result};

/// Default bound on the size of one buffered record.
pub const DEFAULT_MAX_TOKEN_SIZE: usize = 64 * 1024;

const END_MARKER: &[u8] = b"\n  },";
const FINAL_END_MARKER: &[u8] = b"\n  }";
const START_MARKER: &[u8] = b"  {\n";
const START_MARKER_CRLF: &[u8] = b"  {\r\n";

const READ_CHUNK: usize = 8 * 1024;

/// Pulls one frame record's raw text at a time out of a byte stream.
///
/// The returned token borrows the scanner's buffer and is valid until the
/// next call; callers that keep it make their own copy.
pub struct FrameScanner<R> {
    source: R,
    buf: Vec<u8>,
    /// Bytes of the previous token (plus separator) to discard on the next call.
    consumed: usize,
    eof: bool,
    max_token_size: usize,
}

impl<R: Read> FrameScanner<R> {
    pub fn new(source: R) -> Self {
        Self::with_max_token_size(source, DEFAULT_MAX_TOKEN_SIZE)
    }

    pub fn with_max_token_size(source: R, max_token_size: usize) -> Self {
        Self { source, buf: Vec::new(), consumed: 0, eof: false, max_token_size }
    }

    pub fn max_token_size(&self) -> usize {
        self.max_token_size
    }

    pub fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Extract the next complete frame record.
    ///
    /// Returns `Ok(None)` when the stream is cleanly exhausted. Every error
    /// is terminal: a truncated final record, a missing start marker, a
    /// record larger than the configured bound, or a read failure.
    pub fn next_token(&mut self) -> Result<Option<&[u8]>> {
        self.buf.drain(..self.consumed);
        self.consumed = 0;

        loop {
            if let Some((start, end, advance)) = self.find_record()? {
                self.consumed = advance;
                trace!("Scanned record: {} bytes ({} consumed)", end - start, advance);
                return Ok(Some(&self.buf[start..end]));
            }

            if self.eof {
                // A start marker with no matching end means the input was cut
                // off mid-record; anything else (the closing "]", trailing
                // whitespace) is a clean end of stream.
                if find(&self.buf, START_MARKER).is_some()
                    || find(&self.buf, START_MARKER_CRLF).is_some()
                {
                    return Err(ExportError::Truncated { buffered: self.buf.len() });
                }
                return Ok(None);
            }

            if self.buf.len() >= self.max_token_size {
                return Err(ExportError::TokenTooLarge {
                    limit: self.max_token_size,
                    buffered: self.buf.len(),
                });
            }

            self.fill()?;
        }
    }

    /// Locate one record in the buffered bytes: `(start, end, advance)` where
    /// `start..end` is the token (through the closing `"  }"` inclusive) and
    /// `advance` also covers the trailing comma when present.
    fn find_record(&self) -> Result<Option<(usize, usize, usize)>> {
        // While more input may arrive, only a comma-terminated record is
        // unambiguous; the final record's bare "\n  }" becomes searchable
        // once the stream is exhausted.
        let end = if self.eof {
            find(&self.buf, FINAL_END_MARKER)
        } else {
            find(&self.buf, END_MARKER)
        };
        let Some(end) = end else {
            return Ok(None);
        };

        let token_end = end + FINAL_END_MARKER.len();
        let mut advance = token_end;
        if self.buf.get(advance) == Some(&b',') {
            advance += 1;
        }

        let start = find(&self.buf[..end], START_MARKER)
            .or_else(|| find(&self.buf[..end], START_MARKER_CRLF));
        let Some(start) = start else {
            return Err(ExportError::MissingStartMarker);
        };

        Ok(Some((start, token_end, advance)))
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.source.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ExportError::Read { source: e }),
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TWO_RECORDS: &str = "[\n  {\n    \"_source\": {\n      \"layers\": {}\n    }\n  },\n  {\n    \"_source\": {\n      \"layers\": {}\n    }\n  }\n]\n";

    fn scan_all(input: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut scanner = FrameScanner::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = scanner.next_token()? {
            tokens.push(token.to_vec());
        }
        Ok(tokens)
    }

    #[test]
    fn two_records_yield_two_tokens_in_order() {
        let tokens = scan_all(TWO_RECORDS.as_bytes()).unwrap();
        assert_eq!(tokens.len(), 2);
        for token in &tokens {
            assert!(token.starts_with(b"  {"));
            assert!(token.ends_with(b"\n  }"));
            // Each token must stand alone as a JSON object.
            let value: serde_json::Value = serde_json::from_slice(token).unwrap();
            assert!(value.is_object());
        }
    }

    #[test]
    fn crlf_line_endings_are_accepted() {
        let input = TWO_RECORDS.replace('\n', "\r\n");
        let tokens = scan_all(input.as_bytes()).unwrap();
        assert_eq!(tokens.len(), 2);
        for token in &tokens {
            let value: serde_json::Value = serde_json::from_slice(token).unwrap();
            assert!(value.is_object());
        }
    }

    #[test]
    fn truncated_final_record_is_an_error() {
        // Cut off inside the second record, before its closing marker.
        let input = &TWO_RECORDS.as_bytes()[..TWO_RECORDS.len() - 10];
        let mut scanner = FrameScanner::new(input);
        assert!(scanner.next_token().unwrap().is_some());
        let err = scanner.next_token().unwrap_err();
        assert!(matches!(err, ExportError::Truncated { .. }));
    }

    #[test]
    fn oversized_record_is_a_fatal_error() {
        let big_value = "x".repeat(200);
        let input = format!(
            "[\n  {{\n    \"_source\": {{\n      \"layers\": {{\"data\": \"{big_value}\"}}\n    }}\n  }}\n]\n"
        );
        let mut scanner = FrameScanner::with_max_token_size(input.as_bytes(), 64);
        let err = scanner.next_token().unwrap_err();
        assert!(matches!(err, ExportError::TokenTooLarge { limit: 64, .. }));
    }

    #[test]
    fn record_within_bound_is_returned() {
        let mut scanner = FrameScanner::with_max_token_size(TWO_RECORDS.as_bytes(), 4096);
        assert!(scanner.next_token().unwrap().is_some());
        assert!(scanner.next_token().unwrap().is_some());
        assert!(scanner.next_token().unwrap().is_none());
    }

    #[test]
    fn end_marker_without_start_marker_is_malformed() {
        let input = b"[\n garbage\n  },\n]\n";
        let mut scanner = FrameScanner::new(&input[..]);
        let err = scanner.next_token().unwrap_err();
        assert!(matches!(err, ExportError::MissingStartMarker));
    }

    #[test]
    fn empty_and_markerless_input_end_cleanly() {
        assert!(scan_all(b"").unwrap().is_empty());
        assert!(scan_all(b"[\n]\n").unwrap().is_empty());
    }

    #[test]
    fn all_records_buffered_at_eof_are_delivered() {
        // Tiny input arrives in full before the first scan; every record must
        // still come out, not just the first.
        let mut scanner = FrameScanner::new(TWO_RECORDS.as_bytes());
        let mut count = 0;
        while scanner.next_token().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn tokens_exclude_the_separating_comma() {
        let tokens = scan_all(TWO_RECORDS.as_bytes()).unwrap();
        assert!(!tokens[0].ends_with(b","));
        assert!(!tokens[1].ends_with(b","));
    }

    proptest! {
        #[test]
        fn scans_every_generated_record(values in prop::collection::vec("[a-z0-9 ]{0,40}", 1..20)) {
            let records: Vec<String> = values
                .iter()
                .map(|v| format!("  {{\n    \"_source\": {{\n      \"layers\": {{\"data\": \"{v}\"}}\n    }}\n  }}"))
                .collect();
            let document = format!("[\n{}\n]\n", records.join(",\n"));

            let tokens = scan_all(document.as_bytes()).unwrap();
            prop_assert_eq!(tokens.len(), values.len());
            for token in &tokens {
                let value: serde_json::Value = serde_json::from_slice(token).unwrap();
                prop_assert!(value.is_object());
            }
        }
    }
}
