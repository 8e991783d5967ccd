//! Callback-driven consumption of a [`ResponseStream`].
//!
//! # Examples
//!
//! ```rust
//! use llmstream::{ProviderId, SseResponseStream, StreamOptions, StreamProcessor};
//!
//! let raw = "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n";
//! let mut stream = SseResponseStream::for_provider(ProviderId::OpenAI, "gpt-4o", raw.as_bytes());
//!
//! let mut seen = Vec::new();
//! let options = StreamOptions::default().on_text(|text| {
//!     seen.push(text.to_string());
//!     Ok(())
//! });
//! StreamProcessor::new().process(&mut stream, options).unwrap();
//! assert_eq!(seen, vec!["Hi"]);
//! ```

use std::io::Write;

use crate::errors::{ErrorKind, StreamError};
use crate::providers::response::ResponseFragment;
use crate::providers::streaming_response::ResponseStream;

pub type FragmentHandler<'a> = Box<dyn FnMut(&ResponseFragment) -> Result<(), StreamError> + 'a>;
pub type TextHandler<'a> = Box<dyn FnMut(&str) -> Result<(), StreamError> + 'a>;
pub type CompleteHandler<'a> = Box<dyn FnMut(Option<&StreamError>) + 'a>;

/// Callbacks and policy for [`StreamProcessor::process`].
pub struct StreamOptions<'a> {
    /// Invoked with every fragment. An error aborts processing.
    pub on_fragment: Option<FragmentHandler<'a>>,
    /// Invoked with the first choice's text when it is non-empty. An error aborts processing.
    pub on_text: Option<TextHandler<'a>>,
    /// Invoked exactly once, with the terminating error if there was one.
    pub on_complete: Option<CompleteHandler<'a>>,
    /// Close the stream on every exit path. Defaults to `true`.
    pub auto_close: bool,
}

impl Default for StreamOptions<'_> {
    fn default() -> Self {
        Self {
            on_fragment: None,
            on_text: None,
            on_complete: None,
            auto_close: true,
        }
    }
}

impl<'a> StreamOptions<'a> {
    pub fn on_fragment<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&ResponseFragment) -> Result<(), StreamError> + 'a,
    {
        self.on_fragment = Some(Box::new(handler));
        self
    }

    pub fn on_text<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str) -> Result<(), StreamError> + 'a,
    {
        self.on_text = Some(Box::new(handler));
        self
    }

    pub fn on_complete<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Option<&StreamError>) + 'a,
    {
        self.on_complete = Some(Box::new(handler));
        self
    }

    pub fn auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }
}

/// Closes the wrapped stream when dropped, if armed.
struct CloseGuard<'s, S: ResponseStream + ?Sized> {
    stream: &'s mut S,
    armed: bool,
}

impl<S: ResponseStream + ?Sized> Drop for CloseGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.stream.close() {
            log::warn!("failed to close response stream: {}", err);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StreamProcessor;

impl StreamProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Drive `stream` to completion, dispatching to the callbacks in `options`.
    ///
    /// Returns the first error from the stream or from a callback.
    pub fn process<S>(
        &self,
        stream: &mut S,
        mut options: StreamOptions<'_>,
    ) -> Result<(), StreamError>
    where
        S: ResponseStream + ?Sized,
    {
        let mut guard = CloseGuard {
            stream,
            armed: options.auto_close,
        };

        let result = Self::drive(&mut *guard.stream, &mut options);

        if let Some(on_complete) = options.on_complete.as_mut() {
            on_complete(result.as_ref().err());
        }

        drop(guard);
        result
    }

    /// Shorthand for processing with only a text handler and auto-close.
    pub fn process_with_handler<S, F>(&self, stream: &mut S, handler: F) -> Result<(), StreamError>
    where
        S: ResponseStream + ?Sized,
        F: FnMut(&str) -> Result<(), StreamError>,
    {
        self.process(stream, StreamOptions::default().on_text(handler))
    }

    fn drive<S>(stream: &mut S, options: &mut StreamOptions<'_>) -> Result<(), StreamError>
    where
        S: ResponseStream + ?Sized,
    {
        while let Some(fragment) = stream.recv()? {
            if let Some(on_fragment) = options.on_fragment.as_mut() {
                on_fragment(&fragment)?;
            }

            if let Some(on_text) = options.on_text.as_mut() {
                match fragment.content_delta() {
                    Some(text) if !text.is_empty() => on_text(text)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

/// Concatenate the text of every fragment.
pub fn collect_full_content<S>(stream: &mut S) -> Result<String, StreamError>
where
    S: ResponseStream + ?Sized,
{
    let mut content = String::new();
    StreamProcessor::new().process_with_handler(stream, |text| {
        content.push_str(text);
        Ok(())
    })?;
    Ok(content)
}

/// Write the text of every fragment to `writer` as it arrives.
pub fn stream_to_writer<S, W>(stream: &mut S, writer: &mut W) -> Result<(), StreamError>
where
    S: ResponseStream + ?Sized,
    W: Write + ?Sized,
{
    StreamProcessor::new().process_with_handler(stream, |text| {
        writer
            .write_all(text.as_bytes())
            .map_err(|err| {
                StreamError::with_source(ErrorKind::Unknown, "failed to write stream output", err)
            })
    })
}
