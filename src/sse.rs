use tracing::{debug, warn};

/// Literal data payload that terminates an event stream without emitting a
/// final event.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One dispatched wire record: an optional event name and the newline-joined
/// data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseRecord {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental parser for SSE text streams.
///
/// Feeds may split records, lines, and even UTF-8 sequences arbitrarily; the
/// parser buffers the partial tail across calls. Records follow the wire
/// format: zero or more `field: value` lines, a blank line dispatches the
/// record, `:`-prefixed lines are comments. This is deliberately not an
/// `EventSource` — callers reach it through POST bodies with custom headers.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    /// Feed arbitrary bytes into the parser and drain complete records.
    ///
    /// The tail stays buffered as raw bytes; a line is decoded only once its
    /// terminator arrives, so a multibyte character split across feeds is
    /// reassembled rather than replaced.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseRecord> {
        self.buffer.extend_from_slice(bytes);
        let mut records = Vec::new();

        while let Some(split) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(0..=split).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(record) = self.consume_line(&line) {
                records.push(record);
            }
        }

        records
    }

    /// Parse a complete wire payload in one shot.
    pub fn parse_records(input: &str) -> Vec<SseRecord> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    /// True when buffered input or an unterminated record would be lost if
    /// the stream ended now.
    pub fn has_partial_input(&self) -> bool {
        !self.buffer.iter().all(u8::is_ascii_whitespace) || !self.data_lines.is_empty()
    }

    fn consume_line(&mut self, line: &str) -> Option<SseRecord> {
        if line.is_empty() {
            return self.flush_record();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data_lines.push(value.to_owned()),
            "event" => self.event_name = Some(value.to_owned()),
            "id" | "retry" => debug!(field, "ignoring stream bookkeeping field"),
            other => warn!(field = other, "ignoring unknown stream field"),
        }

        None
    }

    fn flush_record(&mut self) -> Option<SseRecord> {
        let event = self.event_name.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseRecord { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::SseParser;

    #[test]
    fn parse_records_incrementally_across_feed_boundaries() {
        let mut parser = SseParser::default();

        assert!(parser.feed(b"data: {\"event\":\"respon").is_empty());
        let records = parser.feed(b"se.completed\"}\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, "{\"event\":\"response.completed\"}");
        assert!(!parser.has_partial_input());
    }

    #[test]
    fn multibyte_character_split_across_feeds_is_reassembled() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        // split inside the two-byte encoding of 'é'
        let mut parser = SseParser::default();
        assert!(parser.feed(&bytes[..10]).is_empty());
        let records = parser.feed(&bytes[10..]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, "caf\u{e9}");
    }

    #[test]
    fn multi_line_data_is_newline_joined() {
        let records = SseParser::parse_records("data: first\ndata: second\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, "first\nsecond");
    }

    #[test]
    fn comments_and_unknown_fields_are_ignored() {
        let records =
            SseParser::parse_records(": keepalive\nfoo: bar\nid: 7\ndata: payload\n\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, "payload");
    }

    #[test]
    fn event_field_is_carried_on_the_record() {
        let records = SseParser::parse_records("event: response.update\ndata: {}\n\n");
        assert_eq!(records[0].event.as_deref(), Some("response.update"));
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let records = SseParser::parse_records("data: payload\r\n\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data, "payload");
    }

    #[test]
    fn blank_line_without_data_dispatches_nothing() {
        assert!(SseParser::parse_records("event: response.update\n\n").is_empty());
    }

    #[test]
    fn partial_trailing_record_is_detectable() {
        let mut parser = SseParser::default();
        assert!(parser.feed(b"data: half").is_empty());
        assert!(parser.has_partial_input());
    }
}
