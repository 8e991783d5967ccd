//! Gemini `streamGenerateContent?alt=sse` streaming.
//!
//! Each event carries a `GenerateContentResponse` with a `candidates` array.
//! There is no terminal sentinel: the stream is complete when the transport
//! reaches end of input.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::apis::sse::SseEvent;
use crate::errors::{ErrorKind, StreamError};
use crate::providers::interpreter::{EventInterpreter, Interpretation};
use crate::providers::response::{now_timestamp, ChoiceDelta, ResponseFragment, Role};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
    pub model_version: Option<String>,
    pub response_id: Option<String>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
    pub index: Option<u32>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ContentPart>,
    pub role: Option<String>,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ContentPart {
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u32,
    #[serde(default)]
    pub candidates_token_count: u32,
    #[serde(default)]
    pub total_token_count: u32,
}

impl Candidate {
    /// Concatenated text of every part.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// Google API error envelope.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeminiErrorResponse {
    pub error: GeminiErrorDetail,
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GeminiErrorDetail {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
    pub details: Option<Value>,
}

/// Lookup table for Gemini error codes, which mirror HTTP status codes.
pub fn error_kind(code: u16) -> ErrorKind {
    match code {
        400 => ErrorKind::InvalidRequest,
        401 | 403 => ErrorKind::Authentication,
        429 => ErrorKind::RateLimit,
        500 | 502 | 503 => ErrorKind::Server,
        504 => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    }
}

impl GeminiErrorResponse {
    pub fn into_stream_error(self, status_code: Option<u16>) -> StreamError {
        let detail = self.error;
        let err =
            StreamError::new(error_kind(detail.code), detail.message).with_code(detail.status);
        match status_code {
            Some(status) => err.with_status(status),
            None => err,
        }
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

/// Multi-part interpreter. Skips events that produce no deltas and relies on
/// end of input for completion.
///
/// A candidate that carries text together with its `finishReason` yields a
/// single delta holding both, so the last piece of text is never dropped.
/// A `finishReason` alone yields a delta with empty text.
#[derive(Debug, Default)]
pub struct GenerateContentInterpreter {
    model: String,
    emitted: u64,
    finish_seen: bool,
}

impl GenerateContentInterpreter {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Whether any candidate reported a finish reason so far.
    pub fn finish_seen(&self) -> bool {
        self.finish_seen
    }

    fn to_choices(&mut self, candidates: Vec<Candidate>) -> Vec<ChoiceDelta> {
        let mut choices = Vec::with_capacity(candidates.len());

        for (position, candidate) in candidates.into_iter().enumerate() {
            let index = candidate.index.unwrap_or(position as u32);
            let text = candidate.text();
            let finish_reason = candidate.finish_reason.filter(|reason| !reason.is_empty());

            match finish_reason {
                Some(reason) => {
                    self.finish_seen = true;
                    choices.push(
                        ChoiceDelta::text(index, Some(Role::Assistant), text)
                            .with_finish_reason(Some(reason)),
                    );
                }
                None if !text.is_empty() => {
                    choices.push(ChoiceDelta::text(index, Some(Role::Assistant), text));
                }
                None => {}
            }
        }

        choices
    }
}

impl EventInterpreter for GenerateContentInterpreter {
    fn interpret(&mut self, event: SseEvent) -> Result<Interpretation, StreamError> {
        let Some(data) = event.data.as_deref().filter(|data| !data.is_empty()) else {
            return Ok(Interpretation::Skip);
        };

        let value: Value = serde_json::from_str(data).map_err(StreamError::malformed_payload)?;
        if value.get("error").is_some_and(|error| !error.is_null()) {
            let body: GeminiErrorResponse =
                serde_json::from_value(value).map_err(StreamError::malformed_payload)?;
            return Err(body.into_stream_error(None));
        }

        let response: GenerateContentResponse =
            serde_json::from_value(value).map_err(StreamError::malformed_payload)?;

        let choices = self.to_choices(response.candidates);
        if choices.is_empty() {
            log::trace!("gemini event produced no deltas, reading on");
            return Ok(Interpretation::Skip);
        }

        self.emitted += 1;
        let id = response
            .response_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("chunk-{}", self.emitted));
        let model = match response.model_version {
            Some(version) if self.model.is_empty() => version,
            _ => self.model.clone(),
        };

        Ok(Interpretation::Fragment(
            ResponseFragment::new(id, now_timestamp(), model).with_choices(choices),
        ))
    }

    fn finish(&mut self) {
        if !self.finish_seen {
            log::warn!(
                "gemini stream ended without a finish reason after {} fragments",
                self.emitted
            );
        }
    }
}
