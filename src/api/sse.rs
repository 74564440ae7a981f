//! Server-sent event decoding
//!
//! Bytes from the network are buffered until a blank line closes an event.
//! UTF-8 decoding happens per complete event, so characters split across
//! reads come out whole.

use crate::api::error::ApiError;
use crate::types::payload::StreamChunk;

const FIELD_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Largest event kept while waiting for its delimiter
pub const MAX_EVENT_BYTES: usize = 1 << 20;

/// One event: the payloads of its `data:` lines, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub data: Vec<String>,
}

/// Incremental event splitter
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes already searched for a delimiter
    scanned: usize,
    /// Skipping the rest of an oversized event
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete event, in arrival order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_delimiter(&self.buffer, self.scanned) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            self.scanned = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if let Some(event) = parse_event(&raw[..end]) {
                events.push(event);
            }
        }

        if self.buffer.len() > MAX_EVENT_BYTES {
            tracing::warn!(
                "Dropping stream event larger than {} bytes",
                MAX_EVENT_BYTES
            );
            // the last byte may be the first half of a delimiter
            let keep_from = self.buffer.len() - 1;
            self.buffer.drain(..keep_from);
            self.discarding = true;
        }

        // a delimiter can straddle this read and the next one
        self.scanned = self.buffer.len().saturating_sub(1);
        events
    }

    /// End of input: whatever is left is the final event without delimiter
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        parse_event(&rest)
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|i| i + from)
}

fn parse_event(raw: &[u8]) -> Option<SseEvent> {
    let text = String::from_utf8_lossy(raw);
    let data: Vec<String> = text.lines().filter_map(extract_data).collect();

    if data.is_empty() {
        None
    } else {
        Some(SseEvent { data })
    }
}

/// Payload of a `data:` line, tolerating a duplicated prefix
fn extract_data(line: &str) -> Option<String> {
    let mut rest = line.trim().strip_prefix(FIELD_PREFIX)?.trim_start();
    while let Some(inner) = rest.strip_prefix(FIELD_PREFIX) {
        rest = inner.trim_start();
    }

    let payload = rest.trim_end();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }
    Some(payload.to_string())
}

/// Parse one payload into a chunk
pub fn parse_chunk(payload: &str) -> Result<StreamChunk, ApiError> {
    serde_json::from_str(payload).map_err(|e| ApiError::Parse(format!("{e}: {}", preview(payload))))
}

fn preview(payload: &str) -> String {
    payload.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"content\":\"a\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, vec!["{\"content\":\"a\"}".to_string()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_event_split_across_reads() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"conte").is_empty());
        assert!(decoder.push(b"nt\":\"b\"}\n").is_empty());
        let events = decoder.push(b"\n");
        assert_eq!(events[0].data, vec!["{\"content\":\"b\"}".to_string()]);
    }

    #[test]
    fn test_two_events_in_one_read() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"content\":\"1\"}\n\ndata: {\"content\":\"2\"}\n\ndata: {\"con");
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].data[0], "{\"content\":\"2\"}");
        assert!(decoder.pending() > 0);
    }

    #[test]
    fn test_multibyte_character_split() {
        let bytes = "data: {\"content\":\"한식\"}\n\n".as_bytes();
        // split inside the first hangul syllable
        let cut = bytes.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        let events = decoder.push(&bytes[cut..]);
        let chunk = parse_chunk(&events[0].data[0]).unwrap();
        assert_eq!(chunk.content.as_deref(), Some("한식"));
    }

    #[test]
    fn test_duplicated_prefix_and_multiple_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: data: {\"content\":\"x\"}\ndata:{\"done\":true}\n\n");
        assert_eq!(
            events[0].data,
            vec!["{\"content\":\"x\"}".to_string(), "{\"done\":true}".to_string()]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"content\":\"c\"}\r\n\r\n");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_non_data_lines_and_sentinel_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\n\nevent: message\nid: 3\n\ndata: [DONE]\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_finish_flushes_trailing_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"done\":true}").is_empty());
        let event = decoder.finish().unwrap();
        assert_eq!(event.data, vec!["{\"done\":true}".to_string()]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_delimiter_across_byte_reads() {
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for byte in b"data: {\"content\":\"d\"}\n\ndata: {\"content\":\"e\"}\n\n" {
            events.extend(decoder.push(&[*byte]));
        }
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].data[0], "{\"content\":\"e\"}");
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_oversized_event_is_dropped() {
        let mut decoder = SseDecoder::new();
        let mut huge = b"data: ".to_vec();
        huge.resize(MAX_EVENT_BYTES + 10, b'x');

        assert!(decoder.push(&huge).is_empty());
        assert!(decoder.pending() <= 1);
        assert!(decoder.push(&vec![b'y'; 4096]).is_empty());

        let events = decoder.push(b"zz\n\ndata: {\"content\":\"ok\"}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data[0], "{\"content\":\"ok\"}");
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_parse_chunk_error() {
        let err = parse_chunk("{not json").unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }
}
