//! Wire shapes and event interpreters for each backend family.
pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod sse;

pub use anthropic::{MessagesInterpreter, MessagesStreamEvent};
pub use gemini::{GenerateContentInterpreter, GenerateContentResponse};
pub use openai::{ChatCompletionsInterpreter, ChatCompletionsStreamResponse};
pub use sse::{SseEvent, SseReader};
