use serde_json::Value;

use crate::events::{ChatFinishReason, ChatStreamEvent};

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes the frame, so multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
    done: bool,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some((end, separator_len)) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + separator_len).take(end).collect();
            let frame = String::from_utf8_lossy(&frame);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                self.done = true;
                continue;
            }

            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => events.extend(map_chunk(&value)),
                Err(error) => {
                    tracing::debug!(%error, "skipping malformed SSE frame");
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|window| window == b"\n\n");
    let crlf = buffer.windows(4).position(|window| window == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(lf), Some(crlf)) if crlf < lf => Some((crlf, 4)),
        (Some(lf), _) => Some((lf, 2)),
        (None, Some(crlf)) => Some((crlf, 4)),
        (None, None) => None,
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_chunk(value: &Value) -> Vec<ChatStreamEvent> {
    let mut events = Vec::new();

    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .or_else(|| error.get("type").and_then(Value::as_str))
            .map(ToString::to_string);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        events.push(ChatStreamEvent::Error { code, message });
        return events;
    }

    let choices = value
        .get("choices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for choice in choices {
        let delta = choice.get("delta");

        if let Some(content) = delta
            .and_then(|delta| delta.get("content"))
            .and_then(Value::as_str)
            .filter(|content| !content.is_empty())
        {
            events.push(ChatStreamEvent::ContentDelta {
                delta: content.to_owned(),
            });
        }

        let tool_calls = delta
            .and_then(|delta| delta.get("tool_calls"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (position, call) in tool_calls.iter().enumerate() {
            let index = call
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|index| usize::try_from(index).ok())
                .unwrap_or(position);
            let function = call.get("function");
            events.push(ChatStreamEvent::ToolCallDelta {
                index,
                id: call
                    .get("id")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                name: function
                    .and_then(|function| function.get("name"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                arguments: function
                    .and_then(|function| function.get("arguments"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_owned(),
            });
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            events.push(ChatStreamEvent::Finished {
                reason: ChatFinishReason::parse(reason),
            });
        }
    }

    if let Some(usage) = value.get("usage").filter(|usage| usage.is_object()) {
        let read = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
        events.push(ChatStreamEvent::Usage {
            prompt_tokens: read("prompt_tokens"),
            completion_tokens: read("completion_tokens"),
        });
    }

    events
}
