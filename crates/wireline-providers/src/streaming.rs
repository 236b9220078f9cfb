//! Shared utilities for streaming SSE response parsing.
//!
//! The HTTP transport feeds raw network chunks into [`SseDecoder`], which
//! yields one JSON payload per complete `data:` line.

use serde_json::Value;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// UTF-8 Streaming
// ─────────────────────────────────────────────────────────────────────────────

/// Try to decode bytes as UTF-8, handling incomplete sequences at the end.
/// Returns the decoded string and leaves any incomplete bytes in the buffer.
pub fn decode_utf8_streaming(byte_buffer: &mut Vec<u8>) -> Option<String> {
    match std::str::from_utf8(byte_buffer) {
        Ok(s) => {
            let result = s.to_string();
            byte_buffer.clear();
            Some(result)
        }
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            if valid_up_to > 0 {
                let valid_bytes: Vec<u8> = byte_buffer.drain(..valid_up_to).collect();
                String::from_utf8(valid_bytes).ok()
            } else {
                None // No valid UTF-8 yet, wait for more bytes
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON Error Detection
// ─────────────────────────────────────────────────────────────────────────────

/// Check if a JSON parse error indicates incomplete data (vs. malformed JSON).
pub fn is_incomplete_json_error(error: &serde_json::Error, data: &str) -> bool {
    let msg = error.to_string().to_lowercase();
    let looks_incomplete = msg.contains("eof")
        || msg.contains("unterminated")
        || msg.contains("unexpected end")
        || msg.contains("trailing");
    let missing_terminator = !data.trim_end().ends_with('}') && !data.trim_end().ends_with(']');
    looks_incomplete || missing_terminator
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE Decoding
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SseEvent {
    Data(Value),
    Done,
}

/// Incremental decoder for a `text/event-stream` body.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    byte_buffer: Vec<u8>,
    buffer: String,
    incomplete_data_line: String,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning every event completed by them.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.byte_buffer.extend_from_slice(bytes);
        let Some(text) = decode_utf8_streaming(&mut self.byte_buffer) else {
            return Vec::new();
        };
        self.buffer.push_str(&text);

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim().to_string();
            self.buffer.drain(..line_end + 1);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer).trim().to_string();
        self.process_line(line)
    }

    fn process_line(&mut self, line: String) -> Option<SseEvent> {
        if line.is_empty() {
            return None;
        }

        // Reassemble lines split across chunks
        let line = if !self.incomplete_data_line.is_empty() {
            let complete = format!("{}{}", self.incomplete_data_line, line);
            self.incomplete_data_line.clear();
            complete
        } else {
            line
        };

        let Some(data) = line
            .strip_prefix("data: ")
            .or_else(|| line.strip_prefix("data:"))
        else {
            if line.starts_with("event:") || line.starts_with("id:") || line.starts_with(':') {
                debug!("SSE control line: {}", line);
            }
            return None;
        };
        let data = data.trim();

        if data == "[DONE]" {
            debug!("Received stream completion marker");
            return Some(SseEvent::Done);
        }

        match serde_json::from_str::<Value>(data) {
            Ok(value) => Some(SseEvent::Data(value)),
            Err(e) => {
                if is_incomplete_json_error(&e, data) {
                    debug!("Incomplete JSON, buffering for next chunk");
                    self.incomplete_data_line = line;
                } else {
                    debug!("Failed to parse stream chunk: {} - Data: {}", e, data);
                }
                None
            }
        }
    }
}
