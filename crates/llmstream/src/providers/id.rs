use crate::apis::anthropic::{AnthropicErrorResponse, MessagesInterpreter};
use crate::apis::gemini::{GeminiErrorResponse, GenerateContentInterpreter};
use crate::apis::openai::{ChatCompletionsInterpreter, OpenAIErrorResponse};
use crate::errors::{ErrorKind, StreamError};
use crate::providers::interpreter::StreamInterpreter;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Provider identifier enum - simple enum for identifying providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    OpenAI,
    DeepSeek,
    Anthropic,
    Gemini,
}

impl FromStr for ProviderId {
    type Err = StreamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAI),
            "deepseek" => Ok(ProviderId::DeepSeek),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "gemini" | "google" => Ok(ProviderId::Gemini),
            _ => Err(StreamError::new(
                ErrorKind::InvalidRequest,
                format!("unknown provider: {}", value),
            )),
        }
    }
}

impl ProviderId {
    pub fn all_variants() -> Vec<Self> {
        vec![
            ProviderId::OpenAI,
            ProviderId::DeepSeek,
            ProviderId::Anthropic,
            ProviderId::Gemini,
        ]
    }

    /// Build the event interpreter for one stream of this provider.
    ///
    /// `model` fills the fragment model name for backends that do not echo it.
    pub fn interpreter(&self, model: &str) -> StreamInterpreter {
        match self {
            ProviderId::OpenAI | ProviderId::DeepSeek => ChatCompletionsInterpreter::new().into(),
            ProviderId::Anthropic => MessagesInterpreter::with_model(model).into(),
            ProviderId::Gemini => GenerateContentInterpreter::new(model).into(),
        }
    }

    /// Map a non-success HTTP response to a [`StreamError`] using this
    /// provider's error table. Bodies that do not match the provider's error
    /// shape become `Server` errors carrying the status.
    pub fn map_error_response(&self, status_code: u16, body: &str) -> StreamError {
        let mapped = match self {
            ProviderId::OpenAI | ProviderId::DeepSeek => {
                serde_json::from_str::<OpenAIErrorResponse>(body)
                    .map(|err| err.into_stream_error(Some(status_code)))
            }
            ProviderId::Anthropic => serde_json::from_str::<AnthropicErrorResponse>(body)
                .map(|err| err.error.into_stream_error(Some(status_code))),
            ProviderId::Gemini => serde_json::from_str::<GeminiErrorResponse>(body)
                .map(|err| err.into_stream_error(Some(status_code))),
        };

        mapped.unwrap_or_else(|err| {
            log::debug!(
                "{} error body did not parse ({}), status {}",
                self,
                err,
                status_code
            );
            StreamError::unparsed_status(status_code)
        })
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderId::OpenAI => write!(f, "openai"),
            ProviderId::DeepSeek => write!(f, "deepseek"),
            ProviderId::Anthropic => write!(f, "anthropic"),
            ProviderId::Gemini => write!(f, "gemini"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_provider_id_conversion() {
        assert_eq!("openai".parse::<ProviderId>().unwrap(), ProviderId::OpenAI);
        assert_eq!("DeepSeek".parse::<ProviderId>().unwrap(), ProviderId::DeepSeek);
        assert_eq!("claude".parse::<ProviderId>().unwrap(), ProviderId::Anthropic);
        assert_eq!("gemini".parse::<ProviderId>().unwrap(), ProviderId::Gemini);

        let err = "mistral".parse::<ProviderId>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_display_round_trips() {
        for provider in ProviderId::all_variants() {
            assert_eq!(provider.to_string().parse::<ProviderId>().unwrap(), provider);
        }
    }

    #[test]
    fn test_interpreter_selection() {
        assert!(matches!(
            ProviderId::DeepSeek.interpreter("deepseek-chat"),
            StreamInterpreter::ChatCompletions(_)
        ));
        assert!(matches!(
            ProviderId::Anthropic.interpreter("claude-3-haiku"),
            StreamInterpreter::Messages(_)
        ));
        assert!(matches!(
            ProviderId::Gemini.interpreter("gemini-pro"),
            StreamInterpreter::GenerateContent(_)
        ));
    }

    #[test]
    fn test_map_error_response_per_provider() {
        let openai = ProviderId::OpenAI.map_error_response(
            429,
            r#"{"error":{"message":"slow down","type":"rate_limit_error"}}"#,
        );
        assert_eq!(openai.kind, ErrorKind::RateLimit);
        assert_eq!(openai.status_code, Some(429));

        let anthropic = ProviderId::Anthropic.map_error_response(
            403,
            r#"{"type":"error","error":{"type":"permission_error","message":"nope"}}"#,
        );
        assert_eq!(anthropic.kind, ErrorKind::Authentication);
        assert_eq!(anthropic.message, "nope");

        let gemini = ProviderId::Gemini.map_error_response(
            400,
            r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(gemini.kind, ErrorKind::InvalidRequest);
        assert_eq!(gemini.code.as_deref(), Some("INVALID_ARGUMENT"));
    }

    #[test]
    fn test_unparsable_error_body_is_server_error() {
        let err = ProviderId::DeepSeek.map_error_response(502, "<html>Bad Gateway</html>");
        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(err.status_code, Some(502));
        assert_eq!(err.message, "API error (status code: 502)");
    }
}
