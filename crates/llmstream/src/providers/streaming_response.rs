use std::io::{BufReader, Read};

use uuid::Uuid;

use crate::apis::sse::SseReader;
use crate::errors::StreamError;
use crate::providers::id::ProviderId;
use crate::providers::interpreter::{EventInterpreter, Interpretation, StreamInterpreter};
use crate::providers::response::ResponseFragment;

/// Backend-agnostic pull interface over a streaming completion.
pub trait ResponseStream {
    /// Block until the next fragment is available.
    ///
    /// `Ok(None)` is the completion signal; once returned (or once an error
    /// has been returned) every later call returns `Ok(None)` as well.
    fn recv(&mut self) -> Result<Option<ResponseFragment>, StreamError>;

    /// Release the byte source and interpreter state. Idempotent.
    fn close(&mut self) -> Result<(), StreamError>;
}

impl<S: ResponseStream + ?Sized> ResponseStream for Box<S> {
    fn recv(&mut self) -> Result<Option<ResponseFragment>, StreamError> {
        (**self).recv()
    }

    fn close(&mut self) -> Result<(), StreamError> {
        (**self).close()
    }
}

struct StreamInner<R: Read> {
    events: SseReader<BufReader<R>>,
    interpreter: StreamInterpreter,
}

/// [`ResponseStream`] reading Server-Sent Events from a blocking byte source.
pub struct SseResponseStream<R: Read> {
    provider: ProviderId,
    stream_id: Uuid,
    inner: Option<StreamInner<R>>,
    finished: bool,
}

impl<R: Read> SseResponseStream<R> {
    pub fn new(provider: ProviderId, source: R, interpreter: StreamInterpreter) -> Self {
        let stream_id = Uuid::new_v4();
        log::debug!("opened {} stream {}", provider, stream_id);
        Self {
            provider,
            stream_id,
            inner: Some(StreamInner {
                events: SseReader::new(BufReader::new(source)),
                interpreter,
            }),
            finished: false,
        }
    }

    /// Stream using the provider's default interpreter for `model`.
    pub fn for_provider(provider: ProviderId, model: &str, source: R) -> Self {
        Self::new(provider, source, provider.interpreter(model))
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn next_fragment(inner: &mut StreamInner<R>) -> Result<Option<ResponseFragment>, StreamError> {
        // Loop rather than recurse: backends may send long runs of no-op events.
        loop {
            let Some(event) = inner.events.read_event()? else {
                inner.interpreter.finish();
                return Ok(None);
            };

            match inner.interpreter.interpret(event)? {
                Interpretation::Fragment(fragment) => return Ok(Some(fragment)),
                Interpretation::Skip => continue,
                Interpretation::Done => return Ok(None),
            }
        }
    }
}

impl<R: Read> ResponseStream for SseResponseStream<R> {
    fn recv(&mut self) -> Result<Option<ResponseFragment>, StreamError> {
        if self.finished {
            return Ok(None);
        }
        let Some(inner) = self.inner.as_mut() else {
            log::debug!("recv on closed stream {}", self.stream_id);
            return Ok(None);
        };

        let result = Self::next_fragment(inner);
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.finished = true;
                log::debug!("{} stream {} completed", self.provider, self.stream_id);
            }
            Err(err) => {
                self.finished = true;
                log::debug!("{} stream {} failed: {}", self.provider, self.stream_id, err);
            }
        }
        result
    }

    fn close(&mut self) -> Result<(), StreamError> {
        if self.inner.take().is_some() {
            log::debug!("closed {} stream {}", self.provider, self.stream_id);
        }
        Ok(())
    }
}

impl<R: Read> Iterator for SseResponseStream<R> {
    type Item = Result<ResponseFragment, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::io::{self, Cursor};

    fn openai_stream(raw: &str) -> SseResponseStream<Cursor<Vec<u8>>> {
        SseResponseStream::for_provider(
            ProviderId::OpenAI,
            "gpt-4o",
            Cursor::new(raw.as_bytes().to_vec()),
        )
    }

    const HELLO_STREAM: &str = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    #[test]
    fn test_recv_until_done() {
        let mut stream = openai_stream(HELLO_STREAM);

        let first = stream.recv().unwrap().unwrap();
        assert_eq!(first.content_delta(), Some("Hel"));
        let second = stream.recv().unwrap().unwrap();
        assert_eq!(second.content_delta(), Some("lo"));

        assert!(stream.recv().unwrap().is_none());
        assert!(stream.is_finished());
        // Completion is sticky
        assert!(stream.recv().unwrap().is_none());
    }

    #[test]
    fn test_nothing_after_done_is_read() {
        let raw = format!(
            "{}data: {{\"choices\":[{{\"index\":0,\"delta\":{{\"content\":\"late\"}}}}]}}\n\n",
            HELLO_STREAM
        );
        let texts: Vec<String> = openai_stream(&raw)
            .map(|fragment| fragment.unwrap().content_delta().unwrap().to_string())
            .collect();
        assert_eq!(texts, vec!["Hel", "lo"]);
    }

    #[test]
    fn test_many_noop_events_do_not_recurse() {
        let mut raw = String::new();
        for _ in 0..50_000 {
            raw.push_str("data: {\"type\":\"ping\"}\n\n");
        }
        raw.push_str("data: {\"type\":\"message_stop\"}\n\n");

        let mut stream = SseResponseStream::for_provider(
            ProviderId::Anthropic,
            "claude-3-haiku",
            Cursor::new(raw.into_bytes()),
        );
        assert!(stream.recv().unwrap().is_none());
    }

    #[test]
    fn test_gemini_completes_at_end_of_input() {
        let raw = concat!(
            "data: {\"candidates\":[]}\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\n",
            "data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\n\n",
        );
        let mut stream = SseResponseStream::for_provider(
            ProviderId::Gemini,
            "gemini-pro",
            Cursor::new(raw.as_bytes().to_vec()),
        );

        assert_eq!(stream.recv().unwrap().unwrap().content_delta(), Some("Hi"));
        let last = stream.recv().unwrap().unwrap();
        assert_eq!(last.finish_reason(), Some("STOP"));
        assert!(stream.recv().unwrap().is_none());
    }

    #[test]
    fn test_error_ends_the_stream() {
        let raw = concat!(
            "data: {not json}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"never\"}}]}\n\n",
        );
        let mut stream = openai_stream(raw);

        let err = stream.recv().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);
        assert!(stream.recv().unwrap().is_none());
    }

    struct BrokenPipe;

    impl Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection dropped"))
        }
    }

    #[test]
    fn test_transport_failure_is_connection_error() {
        let mut stream =
            SseResponseStream::for_provider(ProviderId::DeepSeek, "deepseek-chat", BrokenPipe);
        assert_eq!(stream.recv().unwrap_err().kind, ErrorKind::Connection);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut stream = openai_stream(HELLO_STREAM);
        assert!(stream.recv().unwrap().is_some());

        stream.close().unwrap();
        stream.close().unwrap();
        assert!(stream.is_closed());
        assert!(stream.recv().unwrap().is_none());
    }

    #[test]
    fn test_boxed_trait_object() {
        let mut stream: Box<dyn ResponseStream> = Box::new(openai_stream(HELLO_STREAM));
        assert!(stream.recv().unwrap().is_some());
        stream.close().unwrap();
        stream.close().unwrap();
    }
}
