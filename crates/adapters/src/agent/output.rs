// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental scanner for the worker's mixed text + NDJSON stream.

use looper_core::ResultEvent;
use serde_json::Value;

/// Everything the scanner extracted from one worker's output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOutcome {
    /// Accumulated free text: token deltas, assistant text blocks, and any
    /// lines that were not JSON events.
    pub text: String,
    /// The terminal `result` event, if the stream carried one.
    pub result: Option<ResultEvent>,
}

/// Incremental stream scanner. Feed de-framed bytes as they arrive; call
/// [`finish`](OutputScanner::finish) at end of stream.
///
/// The scanner never fails: malformed JSON, truncated lines, and invalid
/// UTF-8 all degrade to literal text.
#[derive(Debug, Default)]
pub struct OutputScanner {
    pending: Vec<u8>,
    text: String,
    result: Option<ResultEvent>,
}

impl OutputScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of de-framed output.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.route_line(line.trim_end_matches(['\n', '\r']));
        }
    }

    /// Flush the trailing partial line and return the accumulated outcome.
    pub fn finish(mut self) -> ScanOutcome {
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned();
            self.route_line(line.trim_end_matches('\r'));
        }
        ScanOutcome {
            text: self.text,
            result: self.result,
        }
    }

    fn route_line(&mut self, line: &str) {
        let Some(event) = decode_event(line) else {
            // Not a JSON event: keep the line verbatim
            self.text.push_str(line);
            self.text.push('\n');
            return;
        };

        match event {
            Event::StreamDelta(delta) => self.text.push_str(&delta),
            Event::AssistantText(blocks) => {
                for block in blocks {
                    self.text.push_str(&block);
                    self.text.push('\n');
                }
            }
            Event::Result(result) => self.result = Some(result),
            Event::Ignored => {}
        }
    }
}

enum Event {
    StreamDelta(String),
    AssistantText(Vec<String>),
    Result(ResultEvent),
    Ignored,
}

/// Decode one line as a typed NDJSON event. `None` means the line is not an
/// event and should be kept as literal text.
fn decode_event(line: &str) -> Option<Event> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let json: Value = serde_json::from_str(trimmed).ok()?;
    let event_type = json.get("type")?.as_str()?.to_string();

    match event_type.as_str() {
        "stream_event" => {
            let delta = json
                .get("event")
                .and_then(|e| e.get("delta"))
                .or_else(|| json.get("delta"))
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or_default();
            Some(Event::StreamDelta(delta.to_string()))
        }
        "assistant" => {
            let blocks = json
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_array())
                .map(|content| {
                    content
                        .iter()
                        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            Some(Event::AssistantText(blocks))
        }
        "result" => {
            let result = match serde_json::from_value(json) {
                Ok(result) => result,
                Err(error) => {
                    tracing::debug!(error = %error, "malformed result event, keeping defaults");
                    ResultEvent::default()
                }
            };
            Some(Event::Result(result))
        }
        _ => Some(Event::Ignored),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
