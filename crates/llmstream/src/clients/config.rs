use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::{ErrorKind, StreamError};
use crate::providers::id::ProviderId;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for one backend.
///
/// ```rust
/// use llmstream::clients::config::ClientConfig;
///
/// let config = ClientConfig::from_yaml_str("api_key: sk-test\ntimeout_secs: 5\n").unwrap();
/// assert_eq!(config.timeout().as_secs(), 5);
/// assert!(config.base_url.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Credential sent with every request. Must be non-empty.
    pub api_key: String,
    /// Overrides the provider's default API root (e.g. a proxy or a local test server).
    pub base_url: Option<String>,
    /// Deadline for the whole exchange, including reading the stream body.
    /// When it fires, the blocked read fails with a `Timeout` error.
    /// Defaults to 60 seconds.
    pub timeout_secs: Option<u64>,
    /// Overrides the API version header where the provider uses one (Anthropic).
    pub api_version: Option<String>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, StreamError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            StreamError::with_source(ErrorKind::InvalidRequest, "invalid client configuration", err)
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Configured base URL, or the provider default, without a trailing slash.
    pub fn base_url_for(&self, provider: ProviderId) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| default_base_url(provider))
            .trim_end_matches('/')
            .to_string()
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.api_key.trim().is_empty() {
            return Err(StreamError::new(
                ErrorKind::Authentication,
                "API key must not be empty",
            ));
        }
        Ok(())
    }
}

pub fn default_base_url(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::OpenAI => "https://api.openai.com/v1",
        ProviderId::DeepSeek => "https://api.deepseek.com/v1",
        ProviderId::Anthropic => "https://api.anthropic.com",
        ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1",
    }
}

/// Per-provider configuration file, keyed by provider name.
///
/// ```yaml
/// providers:
///   openai:
///     api_key: sk-...
///   anthropic:
///     api_key: sk-ant-...
///     timeout_secs: 120
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub providers: std::collections::HashMap<ProviderId, ClientConfig>,
}

impl ProvidersConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, StreamError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            StreamError::with_source(
                ErrorKind::InvalidRequest,
                "invalid providers configuration",
                err,
            )
        })
    }

    pub fn get(&self, provider: ProviderId) -> Option<&ClientConfig> {
        self.providers.get(&provider)
    }
}
