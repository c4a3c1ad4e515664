use std::fmt;

use serde_json::Value;

use crate::events::{normalize_record, StreamEvent};

/// Marker every event line starts with.
pub const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// A `data:` line whose payload was not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineParseError {
    pub payload: String,
    pub message: String,
}

impl fmt::Display for LineParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LineParseError {}

/// One decoded record, or the parse failure of the line it came from.
pub type ParsedRecord = Result<StreamEvent, LineParseError>;

/// Incremental line framer for chunked event-stream bodies.
///
/// Lines are split on raw bytes before UTF-8 decoding, so a read boundary in
/// the middle of a multi-byte character is harmless.
#[derive(Debug, Default)]
pub struct ChunkParser {
    buffer: Vec<u8>,
}

impl ChunkParser {
    /// Feed arbitrary bytes into the parser and drain records for every
    /// complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ParsedRecord> {
        self.buffer.extend_from_slice(bytes);
        let mut records = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            parse_line(&line[..newline], &mut records);
        }

        records
    }

    /// Flush a trailing line that was never terminated by a line feed.
    pub fn finish(&mut self) -> Vec<ParsedRecord> {
        let mut records = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            parse_line(&line, &mut records);
        }
        records
    }
}

fn parse_line(raw: &[u8], records: &mut Vec<ParsedRecord>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return;
    };

    let payload = payload.trim();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return;
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(value) => records.extend(normalize_record(&value).into_iter().map(Ok)),
        Err(error) => records.push(Err(LineParseError {
            payload: payload.to_owned(),
            message: error.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::ChunkParser;
    use crate::events::StreamEvent;

    #[test]
    fn parse_lines_incrementally() {
        let mut parser = ChunkParser::default();
        let mut records = Vec::new();

        records.extend(parser.feed(b"data: {\"content\":\"Hello\"}\n"));
        assert_eq!(records.len(), 1);

        records.extend(parser.feed(b"data: [DONE]\n"));
        assert_eq!(records.len(), 1);
        assert!(parser.finish().is_empty());
        assert_eq!(
            records[0],
            Ok(StreamEvent::Content {
                text: "Hello".to_owned()
            })
        );
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut parser = ChunkParser::default();
        assert!(parser.feed(b"data: {\"type\":\"stream_end\"}").is_empty());
        assert_eq!(parser.finish(), vec![Ok(StreamEvent::StreamEnd)]);
        assert!(parser.finish().is_empty());
    }
}
