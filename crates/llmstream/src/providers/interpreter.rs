use crate::apis::anthropic::MessagesInterpreter;
use crate::apis::gemini::GenerateContentInterpreter;
use crate::apis::openai::ChatCompletionsInterpreter;
use crate::apis::sse::SseEvent;
use crate::errors::StreamError;
use crate::providers::response::ResponseFragment;

/// Outcome of feeding one raw event to an interpreter.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// A fragment with at least one choice.
    Fragment(ResponseFragment),
    /// Nothing to report; the caller reads the next event.
    Skip,
    /// The backend signalled the end of the response.
    Done,
}

/// Turns raw SSE events of one backend family into unified fragments.
///
/// Implementations own whatever per-stream state their completion rules
/// need. They never return an empty fragment; `Skip` is used instead.
pub trait EventInterpreter: Send {
    fn interpret(&mut self, event: SseEvent) -> Result<Interpretation, StreamError>;

    /// Called once when the byte source is exhausted without a `Done`.
    fn finish(&mut self) {}
}

/// Interpreter selected once per stream from the backend family.
#[derive(Debug)]
pub enum StreamInterpreter {
    ChatCompletions(ChatCompletionsInterpreter),
    Messages(MessagesInterpreter),
    GenerateContent(GenerateContentInterpreter),
}

impl EventInterpreter for StreamInterpreter {
    fn interpret(&mut self, event: SseEvent) -> Result<Interpretation, StreamError> {
        match self {
            Self::ChatCompletions(interpreter) => interpreter.interpret(event),
            Self::Messages(interpreter) => interpreter.interpret(event),
            Self::GenerateContent(interpreter) => interpreter.interpret(event),
        }
    }

    fn finish(&mut self) {
        match self {
            Self::ChatCompletions(interpreter) => interpreter.finish(),
            Self::Messages(interpreter) => interpreter.finish(),
            Self::GenerateContent(interpreter) => interpreter.finish(),
        }
    }
}

impl From<ChatCompletionsInterpreter> for StreamInterpreter {
    fn from(interpreter: ChatCompletionsInterpreter) -> Self {
        Self::ChatCompletions(interpreter)
    }
}

impl From<MessagesInterpreter> for StreamInterpreter {
    fn from(interpreter: MessagesInterpreter) -> Self {
        Self::Messages(interpreter)
    }
}

impl From<GenerateContentInterpreter> for StreamInterpreter {
    fn from(interpreter: GenerateContentInterpreter) -> Self {
        Self::GenerateContent(interpreter)
    }
}
