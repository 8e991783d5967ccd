use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::errors::{ErrorKind, StreamError};
use crate::providers::id::ProviderId;
use crate::providers::response::Role;

/// Anthropic rejects requests without `max_tokens`.
pub const DEFAULT_ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Backend-independent chat request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    /// Sampling temperature; higher values give more varied output.
    pub temperature: Option<f64>,
    /// Nucleus sampling cutoff.
    pub top_p: Option<f64>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Penalises tokens already present in the output (OpenAI-compatible backends only).
    pub presence_penalty: Option<f64>,
    /// Penalises tokens by their frequency so far (OpenAI-compatible backends only).
    pub frequency_penalty: Option<f64>,
    /// Sequences that stop generation when produced.
    #[serde(default)]
    pub stop: Vec<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.model.trim().is_empty() {
            return Err(StreamError::new(ErrorKind::InvalidRequest, "model must not be empty"));
        }
        if self.messages.is_empty() {
            return Err(StreamError::new(
                ErrorKind::InvalidRequest,
                "messages must not be empty",
            ));
        }
        Ok(())
    }

    /// Serialize the streaming body in the provider's native shape.
    pub fn to_stream_body(&self, provider: ProviderId) -> Result<serde_json::Value, StreamError> {
        let body = match provider {
            ProviderId::OpenAI | ProviderId::DeepSeek => {
                serde_json::to_value(ChatCompletionsRequestBody::from(self))
            }
            ProviderId::Anthropic => serde_json::to_value(MessagesRequestBody::from(self)),
            ProviderId::Gemini => serde_json::to_value(GenerateContentRequestBody::from(self)),
        };
        body.map_err(|err| {
            StreamError::with_source(ErrorKind::InvalidRequest, "failed to serialize request", err)
        })
    }
}

// ============================================================================
// OPENAI / DEEPSEEK
// ============================================================================

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionsRequestBody<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u32>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub stop: Option<&'a [String]>,
    pub stream: bool,
}

impl<'a> From<&'a ChatRequest> for ChatCompletionsRequestBody<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
            stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
            stream: true,
        }
    }
}

// ============================================================================
// ANTHROPIC
// ============================================================================

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone)]
pub struct MessagesRequestBody<'a> {
    pub model: &'a str,
    pub messages: Vec<&'a Message>,
    pub system: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub stop_sequences: Option<&'a [String]>,
    pub stream: bool,
}

impl<'a> From<&'a ChatRequest> for MessagesRequestBody<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        let (system, messages): (Vec<&Message>, Vec<&Message>) = request
            .messages
            .iter()
            .partition(|message| message.role == Role::System);

        let system = (!system.is_empty()).then(|| {
            system
                .iter()
                .map(|message| message.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n")
        });

        Self {
            model: &request.model,
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_ANTHROPIC_MAX_TOKENS),
            temperature: request.temperature,
            top_p: request.top_p,
            stop_sequences: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
            stream: true,
        }
    }
}

// ============================================================================
// GEMINI
// ============================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequestBody<'a> {
    pub contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig<'a>>,
    pub safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Debug, Clone)]
pub struct GeminiContent<'a> {
    pub role: &'static str,
    pub parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize, Debug, Clone)]
pub struct GeminiPart<'a> {
    pub text: &'a str,
}

#[skip_serializing_none]
#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig<'a> {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub stop_sequences: Option<&'a [String]>,
}

#[derive(Serialize, Debug, Clone)]
pub struct SafetySetting {
    pub category: &'static str,
    pub threshold: &'static str,
}

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::System | Role::Assistant => "model",
    }
}

impl<'a> From<&'a ChatRequest> for GenerateContentRequestBody<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .map(|message| GeminiContent {
                role: gemini_role(message.role),
                parts: vec![GeminiPart {
                    text: &message.content,
                }],
            })
            .collect();

        let config = GenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            max_output_tokens: request.max_tokens,
            stop_sequences: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
        };
        let has_config = config.temperature.is_some()
            || config.top_p.is_some()
            || config.max_output_tokens.is_some()
            || config.stop_sequences.is_some();

        Self {
            contents,
            generation_config: has_config.then_some(config),
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
        }
    }
}
