// Copyright 2025 Cardbench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Incremental decoder for `text/event-stream` bodies.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, `message` when the server did not name one
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
}

/// Turns arbitrary body chunks into complete events.
///
/// Chunks may split lines and even UTF-8 sequences; bytes are buffered
/// until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let decoded = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            let line: &str = decoded.strip_suffix('\r').unwrap_or(&decoded);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                // id and retry do not matter for a single benchmark session
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_then_message() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b"event: endpoint\r\ndata: /messages/?session_id=abc\r\n\r\n\
              event: message\ndata: {\"id\":1}\n\n",
        );
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "endpoint".to_string(),
                    data: "/messages/?session_id=abc".to_string()
                },
                SseEvent {
                    event: "message".to_string(),
                    data: "{\"id\":1}".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_chunks_split_mid_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: mess").is_empty());
        assert!(decoder.feed(b"age\ndata: hel").is_empty());
        let events = decoder.feed(b"lo\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_default_event_type_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn test_comments_and_empty_blocks_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": ping\n\nevent: noop\n\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let text = "data: µs\n\n".as_bytes();
        let (a, b) = text.split_at(7);
        assert!(decoder.feed(a).is_empty());
        let events = decoder.feed(b);
        assert_eq!(events[0].data, "µs");
    }
}
