//! OpenAI chat-completions streaming (also spoken by DeepSeek).
//!
//! Every SSE event carries one `chat.completion.chunk` JSON object. The
//! stream ends with a bare `data: [DONE]` line, which is never parsed as JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::apis::sse::{SseEvent, DONE_SENTINEL};
use crate::errors::{ErrorKind, StreamError};
use crate::providers::interpreter::{EventInterpreter, Interpretation};
use crate::providers::response::{now_timestamp, ChoiceDelta, ResponseFragment, Role};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChatCompletionsStreamResponse {
    #[serde(default)]
    pub id: String,
    pub object: Option<String>,
    pub created: Option<i64>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: StreamDelta,
    pub finish_reason: Option<String>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StreamDelta {
    pub role: Option<String>,
    pub content: Option<String>,
}

/// Error body returned by OpenAI-compatible backends, both as an HTTP
/// response and inline in a stream.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIErrorDetail,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OpenAIErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub param: Option<String>,
    pub code: Option<Value>,
}

/// Lookup table for the `error.type` strings of OpenAI-compatible backends.
pub fn error_kind(error_type: &str) -> ErrorKind {
    match error_type {
        "invalid_request_error" => ErrorKind::InvalidRequest,
        "authentication_error" => ErrorKind::Authentication,
        "rate_limit_error" | "insufficient_quota" => ErrorKind::RateLimit,
        "server_error" => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

impl OpenAIErrorResponse {
    pub fn into_stream_error(self, status_code: Option<u16>) -> StreamError {
        let detail = self.error;
        let kind = detail
            .error_type
            .as_deref()
            .map_or(ErrorKind::Unknown, error_kind);
        let code = detail.code.and_then(|code| match code {
            Value::String(code) => Some(code),
            Value::Null => None,
            other => Some(other.to_string()),
        });

        let err = StreamError::new(kind, detail.message)
            .with_param(detail.param)
            .with_code(code);
        match status_code {
            Some(status) => err.with_status(status),
            None => err,
        }
    }
}

impl From<ChatCompletionsStreamResponse> for Interpretation {
    fn from(chunk: ChatCompletionsStreamResponse) -> Self {
        let choices: Vec<ChoiceDelta> = chunk
            .choices
            .into_iter()
            .map(|choice| {
                let role = choice.delta.role.as_deref().and_then(Role::parse);
                ChoiceDelta::text(choice.index, role, choice.delta.content.unwrap_or_default())
                    .with_finish_reason(choice.finish_reason)
            })
            .collect();

        // Usage-only chunks arrive with an empty choices array
        if choices.is_empty() {
            return Interpretation::Skip;
        }

        let created = chunk.created.unwrap_or_else(now_timestamp);
        Interpretation::Fragment(
            ResponseFragment::new(chunk.id, created, chunk.model).with_choices(choices),
        )
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

/// Simple-delta interpreter: one event in, at most one fragment out.
#[derive(Debug, Default)]
pub struct ChatCompletionsInterpreter;

impl ChatCompletionsInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl EventInterpreter for ChatCompletionsInterpreter {
    fn interpret(&mut self, event: SseEvent) -> Result<Interpretation, StreamError> {
        let Some(data) = event.data.as_deref().filter(|data| !data.is_empty()) else {
            log::trace!("skipping chat completions event without data");
            return Ok(Interpretation::Skip);
        };

        if data == DONE_SENTINEL {
            return Ok(Interpretation::Done);
        }

        let value: Value = serde_json::from_str(data).map_err(StreamError::malformed_payload)?;
        if value.get("error").is_some_and(|error| !error.is_null()) {
            let body: OpenAIErrorResponse =
                serde_json::from_value(value).map_err(StreamError::malformed_payload)?;
            return Err(body.into_stream_error(None));
        }

        let chunk: ChatCompletionsStreamResponse =
            serde_json::from_value(value).map_err(StreamError::malformed_payload)?;
        Ok(chunk.into())
    }
}
