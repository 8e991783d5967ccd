//! llmstream: a unified, pull-based reader for the streaming chat
//! completions of OpenAI, DeepSeek, Anthropic and Gemini.
//!
//! Raw Server-Sent Events are read from any blocking byte source,
//! interpreted by a backend-specific state machine and surfaced as
//! [`ResponseFragment`]s through one [`ResponseStream`] interface.

pub mod apis;
pub mod clients;
pub mod errors;
pub mod processor;
pub mod providers;

// Re-export important types and traits
pub use apis::sse::{SseEvent, SseReader};
pub use clients::{ChatRequest, ClientConfig, Message};
#[cfg(feature = "client")]
pub use clients::StreamingClient;
pub use errors::{ErrorKind, StreamError, StreamResult};
pub use processor::{collect_full_content, stream_to_writer, StreamOptions, StreamProcessor};
pub use providers::id::ProviderId;
pub use providers::interpreter::{EventInterpreter, Interpretation, StreamInterpreter};
pub use providers::response::{ChoiceDelta, ResponseFragment, Role};
pub use providers::streaming_response::{ResponseStream, SseResponseStream};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    #[test]
    fn test_simple_delta_stream_end_to_end() {
        let raw = concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let mut stream =
            SseResponseStream::for_provider(ProviderId::OpenAI, "gpt-4o", raw.as_bytes());

        let collected = RefCell::new(String::new());
        let completions = Cell::new(0);
        let options = StreamOptions::default()
            .on_text(|text| {
                collected.borrow_mut().push_str(text);
                Ok(())
            })
            .on_complete(|err| {
                assert!(err.is_none());
                completions.set(completions.get() + 1);
            });

        StreamProcessor::new().process(&mut stream, options).unwrap();

        assert_eq!(collected.into_inner(), "Hello");
        assert_eq!(completions.get(), 1);
        assert!(stream.is_closed());
    }

    #[test]
    fn test_malformed_payload_end_to_end() {
        let raw = "data: {\"choices\": [oops\n\n";
        let mut stream = SseResponseStream::for_provider(
            ProviderId::DeepSeek,
            "deepseek-chat",
            raw.as_bytes(),
        );

        let texts = Cell::new(0);
        let completed_with = RefCell::new(None);
        let options = StreamOptions::default()
            .on_text(|_| {
                texts.set(texts.get() + 1);
                Ok(())
            })
            .on_complete(|err| *completed_with.borrow_mut() = err.map(|e| e.kind));

        let err = StreamProcessor::new().process(&mut stream, options).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Server);
        assert_eq!(*completed_with.borrow(), Some(ErrorKind::Server));
        assert_eq!(texts.get(), 0);
    }

    #[test]
    fn test_anthropic_lifecycle_through_trait_object() {
        let raw = concat!(
            "event: message_start\n",
            "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"model\":\"claude-3-haiku\"}}\n\n",
            "event: content_block_start\n",
            "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"a\"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"b\"}}\n\n",
            "event: content_block_stop\n",
            "data: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        let mut stream: Box<dyn ResponseStream> = Box::new(SseResponseStream::for_provider(
            ProviderId::Anthropic,
            "claude-3-haiku",
            raw.as_bytes(),
        ));

        let first = stream.recv().unwrap().unwrap();
        assert_eq!(first.id, "msg_1");
        assert_eq!(first.content_delta(), Some("a"));
        assert_eq!(stream.recv().unwrap().unwrap().content_delta(), Some("b"));
        assert!(stream.recv().unwrap().is_none());

        stream.close().unwrap();
        stream.close().unwrap();
    }
}
