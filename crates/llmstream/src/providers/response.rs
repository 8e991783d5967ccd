use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Lenient parse used for backend payloads; unknown or empty roles map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaMessage {
    pub role: Option<Role>,
    #[serde(default)]
    pub content: String,
}

/// Incremental content for one choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceDelta {
    pub index: u32,
    pub delta: DeltaMessage,
    pub finish_reason: Option<String>,
}

impl ChoiceDelta {
    pub fn text(index: u32, role: Option<Role>, content: impl Into<String>) -> Self {
        Self {
            index,
            delta: DeltaMessage {
                role,
                content: content.into(),
            },
            finish_reason: None,
        }
    }

    pub fn with_finish_reason(mut self, finish_reason: Option<String>) -> Self {
        self.finish_reason = finish_reason.filter(|reason| !reason.is_empty());
        self
    }

    pub fn content(&self) -> &str {
        &self.delta.content
    }

    pub fn role(&self) -> Option<Role> {
        self.delta.role
    }
}

/// The backend-independent streaming chunk handed to consumers.
///
/// Serializes to the OpenAI `chat.completion.chunk` shape. Consumers that
/// rebuild parallel completions must key on [`ChoiceDelta::index`], not on
/// the position inside `choices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFragment {
    pub id: String,
    pub object: String,
    /// Unix timestamp in seconds.
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChoiceDelta>,
}

impl ResponseFragment {
    pub fn new(id: impl Into<String>, created: i64, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object: CHAT_COMPLETION_CHUNK_OBJECT.to_string(),
            created,
            model: model.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<ChoiceDelta>) -> Self {
        self.choices = choices;
        self
    }

    /// Text of the first choice, the common single-completion case.
    pub fn content_delta(&self) -> Option<&str> {
        self.choices.first().map(ChoiceDelta::content)
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .iter()
            .find_map(|choice| choice.finish_reason.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

/// Wall clock fallback for backends that do not timestamp their chunks.
pub(crate) fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
