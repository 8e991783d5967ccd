//! Anthropic Messages streaming.
//!
//! The response is a sequence of lifecycle events (`message_start`,
//! `content_block_start`, `content_block_delta`, `content_block_stop`,
//! `message_delta`, `message_stop`). Only text deltas produce fragments; the
//! rest drive the completion state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::apis::sse::SseEvent;
use crate::errors::{ErrorKind, StreamError};
use crate::providers::interpreter::{EventInterpreter, Interpretation};
use crate::providers::response::{now_timestamp, ChoiceDelta, ResponseFragment, Role};

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum MessagesStreamEvent {
    MessageStart {
        message: MessagesStreamMessage,
    },
    ContentBlockStart {
        index: u32,
        #[serde(default)]
        content_block: Value,
    },
    ContentBlockDelta {
        index: u32,
        delta: MessagesContentDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessagesMessageDelta,
    },
    MessageStop,
    Ping,
    Error {
        error: AnthropicErrorDetail,
    },
    /// Event kinds this crate does not know yet.
    #[serde(other)]
    Unknown,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MessagesStreamMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub role: Option<String>,
    pub stop_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum MessagesContentDelta {
    #[serde(rename = "text_delta", alias = "text")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
    #[serde(rename = "thinking_delta")]
    ThinkingDelta { thinking: String },
    #[serde(other)]
    Other,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MessagesMessageDelta {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

/// `{"type": "error", "error": {...}}` body, used for HTTP errors and inline stream errors.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnthropicErrorResponse {
    pub error: AnthropicErrorDetail,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnthropicErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

/// Lookup table for Anthropic `error.type` strings.
pub fn error_kind(error_type: &str) -> ErrorKind {
    match error_type {
        "invalid_request_error" | "not_found_error" => ErrorKind::InvalidRequest,
        "authentication_error" | "permission_error" => ErrorKind::Authentication,
        "rate_limit_error" => ErrorKind::RateLimit,
        "server_error" | "api_error" | "overloaded_error" => ErrorKind::Server,
        "timeout_error" => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    }
}

impl AnthropicErrorDetail {
    pub fn into_stream_error(self, status_code: Option<u16>) -> StreamError {
        let err = StreamError::new(error_kind(&self.error_type), self.message)
            .with_code(Some(self.error_type).filter(|t| !t.is_empty()));
        match status_code {
            Some(status) => err.with_status(status),
            None => err,
        }
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

/// Lifecycle interpreter for one Anthropic message stream.
#[derive(Debug, Default)]
pub struct MessagesInterpreter {
    message_id: String,
    model: String,
    block_open: bool,
    current_block: Option<u32>,
    finished: bool,
}

impl MessagesInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter for a stream whose model is known up front; `message_start`
    /// overrides it when it names one.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn is_block_open(&self) -> bool {
        self.block_open
    }

    pub fn current_block(&self) -> Option<u32> {
        self.current_block
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn apply(&mut self, event: MessagesStreamEvent) -> Result<Interpretation, StreamError> {
        match event {
            MessagesStreamEvent::MessageStart { message } => {
                self.message_id = message.id;
                if !message.model.is_empty() {
                    self.model = message.model;
                }
                Ok(Interpretation::Skip)
            }
            MessagesStreamEvent::ContentBlockStart { index, .. } => {
                self.block_open = true;
                self.current_block = Some(index);
                Ok(Interpretation::Skip)
            }
            MessagesStreamEvent::ContentBlockStop { index } => {
                if self.current_block == Some(index) {
                    self.block_open = false;
                }
                Ok(Interpretation::Skip)
            }
            MessagesStreamEvent::ContentBlockDelta { index, delta } => {
                self.current_block = Some(index);
                match delta {
                    MessagesContentDelta::TextDelta { text } => {
                        let fragment =
                            ResponseFragment::new(&self.message_id, now_timestamp(), &self.model)
                                .with_choices(vec![ChoiceDelta::text(
                                    index,
                                    Some(Role::Assistant),
                                    text,
                                )]);
                        Ok(Interpretation::Fragment(fragment))
                    }
                    _ => Ok(Interpretation::Skip),
                }
            }
            MessagesStreamEvent::MessageDelta { delta } => {
                match delta.stop_reason.filter(|reason| !reason.is_empty()) {
                    Some(reason) => {
                        log::debug!("anthropic message finished: stop_reason={}", reason);
                        self.finished = true;
                        Ok(Interpretation::Done)
                    }
                    None => Ok(Interpretation::Skip),
                }
            }
            MessagesStreamEvent::MessageStop => {
                self.finished = true;
                Ok(Interpretation::Done)
            }
            MessagesStreamEvent::Error { error } => Err(error.into_stream_error(None)),
            MessagesStreamEvent::Ping | MessagesStreamEvent::Unknown => Ok(Interpretation::Skip),
        }
    }
}

impl EventInterpreter for MessagesInterpreter {
    fn interpret(&mut self, event: SseEvent) -> Result<Interpretation, StreamError> {
        let Some(data) = event.data.as_deref().filter(|data| !data.is_empty()) else {
            log::trace!("skipping anthropic event without data: {:?}", event.event);
            return Ok(Interpretation::Skip);
        };

        let parsed: MessagesStreamEvent =
            serde_json::from_str(data).map_err(StreamError::malformed_payload)?;
        self.apply(parsed)
    }

    fn finish(&mut self) {
        if !self.finished {
            log::warn!(
                "anthropic stream ended before message_stop (block open: {})",
                self.block_open
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::sse::SseReader;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(value: serde_json::Value) -> SseEvent {
        SseEvent {
            event: value["type"].as_str().map(str::to_string),
            data: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn text_delta(index: u32, text: &str) -> SseEvent {
        event(json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "text_delta", "text": text}
        }))
    }

    fn message_start() -> SseEvent {
        event(json!({
            "type": "message_start",
            "message": {
                "id": "msg_01XFDUDYJgAACzvnptvVoYEL",
                "type": "message",
                "role": "assistant",
                "content": [],
                "model": "claude-3-5-sonnet-20241022",
                "stop_reason": null,
                "stop_sequence": null,
                "usage": {"input_tokens": 25, "output_tokens": 1}
            }
        }))
    }

    #[test]
    fn test_lifecycle_yields_only_text_fragments() {
        let mut interpreter = MessagesInterpreter::new();
        let events = vec![
            message_start(),
            text_delta(0, "a"),
            text_delta(0, "b"),
            event(json!({"type": "message_stop"})),
        ];

        let results: Vec<Interpretation> = events
            .into_iter()
            .map(|e| interpreter.interpret(e).unwrap())
            .collect();

        let texts: Vec<&str> = results
            .iter()
            .filter_map(|r| match r {
                Interpretation::Fragment(f) => f.content_delta(),
                _ => None,
            })
            .collect();

        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(results[0], Interpretation::Skip);
        assert_eq!(results[3], Interpretation::Done);
        assert!(interpreter.is_finished());
    }

    #[test]
    fn test_fragments_carry_message_metadata() {
        let mut interpreter = MessagesInterpreter::with_model("claude-placeholder");
        interpreter.interpret(message_start()).unwrap();

        let Interpretation::Fragment(fragment) = interpreter.interpret(text_delta(2, "Hi")).unwrap()
        else {
            panic!("Expected fragment");
        };

        assert_eq!(fragment.id, "msg_01XFDUDYJgAACzvnptvVoYEL");
        assert_eq!(fragment.model, "claude-3-5-sonnet-20241022");
        assert_eq!(fragment.choices[0].index, 2);
        assert_eq!(fragment.choices[0].role(), Some(Role::Assistant));
    }

    #[test]
    fn test_block_state_tracking() {
        let mut interpreter = MessagesInterpreter::new();
        let start = event(json!({
            "type": "content_block_start",
            "index": 1,
            "content_block": {"type": "text", "text": ""}
        }));

        assert_eq!(interpreter.interpret(start).unwrap(), Interpretation::Skip);
        assert!(interpreter.is_block_open());
        assert_eq!(interpreter.current_block(), Some(1));

        let stop = event(json!({"type": "content_block_stop", "index": 1}));
        assert_eq!(interpreter.interpret(stop).unwrap(), Interpretation::Skip);
        assert!(!interpreter.is_block_open());
    }

    #[test]
    fn test_non_text_deltas_are_skipped() {
        let mut interpreter = MessagesInterpreter::new();
        let tool = event(json!({
            "type": "content_block_delta",
            "index": 1,
            "delta": {"type": "input_json_delta", "partial_json": "{\"loc"}
        }));
        let signature = event(json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "signature_delta", "signature": "abc"}
        }));

        assert_eq!(interpreter.interpret(tool).unwrap(), Interpretation::Skip);
        assert_eq!(interpreter.interpret(signature).unwrap(), Interpretation::Skip);
    }

    #[test]
    fn test_message_delta_with_stop_reason_completes() {
        let mut interpreter = MessagesInterpreter::new();
        let without = event(json!({
            "type": "message_delta",
            "delta": {"stop_reason": null, "stop_sequence": null},
            "usage": {"output_tokens": 3}
        }));
        let with = event(json!({
            "type": "message_delta",
            "delta": {"stop_reason": "end_turn", "stop_sequence": null},
            "usage": {"output_tokens": 15}
        }));

        assert_eq!(interpreter.interpret(without).unwrap(), Interpretation::Skip);
        assert_eq!(interpreter.interpret(with).unwrap(), Interpretation::Done);
    }

    #[test]
    fn test_unknown_and_ping_events_are_skipped() {
        let mut interpreter = MessagesInterpreter::new();
        let unknown = event(json!({"type": "citations_preview", "payload": {"n": 1}}));

        assert_eq!(interpreter.interpret(unknown).unwrap(), Interpretation::Skip);
        assert_eq!(
            interpreter.interpret(event(json!({"type": "ping"}))).unwrap(),
            Interpretation::Skip
        );
    }

    #[test]
    fn test_inline_error_event() {
        let mut interpreter = MessagesInterpreter::new();
        let overloaded = event(json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        }));

        let err = interpreter.interpret(overloaded).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.message, "Overloaded");
        assert_eq!(err.code.as_deref(), Some("overloaded_error"));
    }

    #[test]
    fn test_malformed_json_is_server_error() {
        let mut interpreter = MessagesInterpreter::new();
        let broken = SseEvent {
            data: Some("{\"type\": \"content_block_delta\", ".to_string()),
            ..Default::default()
        };
        assert_eq!(interpreter.interpret(broken).unwrap_err().kind, ErrorKind::Server);
    }

    #[test]
    fn test_error_table() {
        assert_eq!(error_kind("invalid_request_error"), ErrorKind::InvalidRequest);
        assert_eq!(error_kind("authentication_error"), ErrorKind::Authentication);
        assert_eq!(error_kind("permission_error"), ErrorKind::Authentication);
        assert_eq!(error_kind("rate_limit_error"), ErrorKind::RateLimit);
        assert_eq!(error_kind("api_error"), ErrorKind::Server);
        assert_eq!(error_kind("something_else"), ErrorKind::Unknown);
    }

    #[test]
    fn test_wire_stream_from_reader() {
        let raw = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"type\":\"message\",\"role\":\"assistant\",\"content\":[],\"model\":\"claude-3-haiku\",\"usage\":{\"input_tokens\":1,\"output_tokens\":1}}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: ping\n",
            "data: {\"type\": \"ping\"}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );

        let mut interpreter = MessagesInterpreter::new();
        let mut fragments = Vec::new();
        for event in SseReader::from(raw.as_bytes()) {
            match interpreter.interpret(event.unwrap()).unwrap() {
                Interpretation::Fragment(f) => fragments.push(f),
                Interpretation::Skip => {}
                Interpretation::Done => break,
            }
        }

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].content_delta(), Some("Hello"));
        assert!(interpreter.is_finished());
        assert!(!interpreter.is_block_open());
    }
}
