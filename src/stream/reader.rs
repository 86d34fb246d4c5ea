//! Event-stream reader.
//!
//! Decodes a raw response body into discrete `{event, data}` records,
//! independent of what the payloads mean. The reader is fed byte
//! chunks exactly as they arrive from the network; chunk boundaries
//! carry no significance, so a multi-byte character or a line may be
//! split across any number of `push` calls.

/// One decoded event. `event` defaults to `"message"` when the wire
/// did not name it.
#[derive(Clone, Debug, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

const DEFAULT_EVENT: &str = "message";

/// Incremental decoder for a `text/event-stream` body.
#[derive(Default)]
pub struct SseReader {
    /// Undecoded trailing bytes (at most one incomplete UTF-8 sequence).
    bytes: Vec<u8>,
    /// Text of the current, not-yet-terminated line.
    line: String,
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.bytes.extend_from_slice(chunk);
        let text = self.decode_available();
        self.consume_text(&text)
    }

    /// Signal end of stream. Decodes whatever bytes remain, processes a
    /// final unterminated line, and flushes any pending event so that a
    /// server omitting the trailing blank line loses nothing.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.bytes.is_empty() {
            let text = String::from_utf8_lossy(&self.bytes).into_owned();
            self.bytes.clear();
            events.extend(self.consume_text(&text));
        }
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.accept_line(&line);
        }
        if let Some(event) = self.flush() {
            events.push(event);
        }
        events
    }

    /// Decode as much of the byte buffer as forms valid UTF-8, keeping
    /// an incomplete trailing sequence for the next chunk. Invalid
    /// sequences in the middle are replaced, never dropped.
    fn decode_available(&mut self) -> String {
        let mut out = String::new();
        let mut input: &[u8] = &self.bytes;
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    out.push_str(valid);
                    input = &[];
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[bad..];
                        }
                        None => {
                            // Incomplete trailing sequence: hold it back.
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }
        self.bytes = input.to_vec();
        out
    }

    fn consume_text(&mut self, text: &str) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for ch in text.chars() {
            if ch == '\n' {
                let mut line = std::mem::take(&mut self.line);
                if line.ends_with('\r') {
                    line.pop();
                }
                if line.is_empty() {
                    if let Some(event) = self.flush() {
                        events.push(event);
                    }
                } else {
                    self.accept_line(&line);
                }
            } else {
                self.line.push(ch);
            }
        }
        events
    }

    /// Apply one complete, non-empty line to the pending event state.
    /// Anything that is neither an `event:` nor a `data:` line
    /// (comments included) is ignored.
    fn accept_line(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("event:") {
            self.event_name = Some(strip_one_space(rest).to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.data_lines.push(strip_one_space(rest).to_string());
        }
    }

    /// Emit the pending event, if any fields accumulated. A blank line
    /// with no preceding fields dispatches nothing.
    fn flush(&mut self) -> Option<SseEvent> {
        if self.event_name.is_none() && self.data_lines.is_empty() {
            return None;
        }
        let event = self
            .event_name
            .take()
            .unwrap_or_else(|| DEFAULT_EVENT.to_string());
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseEvent { event, data })
    }
}

/// Strip exactly one leading space after the field colon, not more.
fn strip_one_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut reader = SseReader::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(reader.push(chunk));
        }
        events.extend(reader.finish());
        events
    }

    #[test]
    fn parses_a_single_default_event() {
        let events = read_all(&[b"data: hello\n\n"]);
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".to_string(),
                data: "hello".to_string(),
            }]
        );
    }

    #[test]
    fn named_event_with_data() {
        let events = read_all(&[b"event: retrieved_chunks\ndata: {\"chunks\":[]}\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "retrieved_chunks");
        assert_eq!(events[0].data, "{\"chunks\":[]}");
    }

    #[test]
    fn joins_multiple_data_lines_with_newlines() {
        let events = read_all(&[b"data: first\ndata: second\n\n"]);
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn strips_only_one_leading_space() {
        let events = read_all(&[b"data:  padded\n\n"]);
        assert_eq!(events[0].data, " padded");
    }

    #[test]
    fn ignores_comment_and_unknown_lines() {
        let events = read_all(&[b": keep-alive\nretry: 500\ndata: x\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn blank_line_without_fields_emits_nothing() {
        let events = read_all(&[b"\n\n\ndata: x\n\n\n"]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let events = read_all(&[b"event: error\r\ndata: {\"error\":\"x\"}\r\n\r\n"]);
        assert_eq!(events[0].event, "error");
        assert_eq!(events[0].data, "{\"error\":\"x\"}");
    }

    #[test]
    fn trailing_event_without_blank_line_is_flushed() {
        let events = read_all(&[b"data: last"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "last");
    }

    #[test]
    fn reassembles_identically_under_arbitrary_splits() {
        let full: &[u8] =
            b"event: retrieved_chunks\ndata: {\"chunks\":[\"a\"]}\n\ndata: caf\xc3\xa9\ndata: more\n\n";
        let expected = read_all(&[full]);
        assert_eq!(expected.len(), 2);

        // Split at every possible byte boundary, including mid-UTF-8.
        for split in 1..full.len() {
            let (a, b) = full.split_at(split);
            assert_eq!(read_all(&[a, b]), expected, "split at {split}");
        }
    }

    #[test]
    fn multibyte_character_split_across_reads_survives() {
        // "é" is 0xC3 0xA9; feed the two bytes separately.
        let events = read_all(&[b"data: caf\xc3", b"\xa9\n\n"]);
        assert_eq!(events[0].data, "caf\u{e9}");
    }

    #[test]
    fn event_name_resets_after_dispatch() {
        let events = read_all(&[b"event: error\ndata: one\n\ndata: two\n\n"]);
        assert_eq!(events[0].event, "error");
        assert_eq!(events[1].event, "message");
    }
}
