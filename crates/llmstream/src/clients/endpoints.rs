//! Streaming endpoint and header construction per provider.
//!
//! # Examples
//!
//! ```rust
//! use llmstream::clients::config::ClientConfig;
//! use llmstream::clients::endpoints::stream_endpoint;
//! use llmstream::ProviderId;
//!
//! let config = ClientConfig::new("sk-test");
//! let url = stream_endpoint(ProviderId::DeepSeek, &config, "deepseek-chat");
//! assert_eq!(url, "https://api.deepseek.com/v1/chat/completions");
//! ```

use crate::apis::anthropic::ANTHROPIC_API_VERSION;
use crate::clients::config::ClientConfig;
use crate::providers::id::ProviderId;

pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";
pub const MESSAGES_PATH: &str = "/v1/messages";
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Full URL of the provider's streaming endpoint.
pub fn stream_endpoint(provider: ProviderId, config: &ClientConfig, model: &str) -> String {
    let base = config.base_url_for(provider);
    match provider {
        ProviderId::OpenAI | ProviderId::DeepSeek => format!("{}{}", base, CHAT_COMPLETIONS_PATH),
        ProviderId::Anthropic => format!("{}{}", base, MESSAGES_PATH),
        ProviderId::Gemini => format!(
            "{}/models/{}:streamGenerateContent?key={}&alt=sse",
            base, model, config.api_key
        ),
    }
}

/// Headers identifying the caller and asking for an event stream.
pub fn stream_headers(provider: ProviderId, config: &ClientConfig) -> Vec<(&'static str, String)> {
    let mut headers = vec![
        ("Content-Type", "application/json".to_string()),
        ("Accept", EVENT_STREAM_CONTENT_TYPE.to_string()),
    ];

    match provider {
        ProviderId::OpenAI | ProviderId::DeepSeek => {
            headers.push(("Authorization", format!("Bearer {}", config.api_key)));
        }
        ProviderId::Anthropic => {
            headers.push(("x-api-key", config.api_key.clone()));
            headers.push((
                "anthropic-version",
                config
                    .api_version
                    .clone()
                    .unwrap_or_else(|| ANTHROPIC_API_VERSION.to_string()),
            ));
        }
        // Gemini authenticates through the query string
        ProviderId::Gemini => {}
    }

    headers
}
