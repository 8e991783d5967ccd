use crate::errors::StreamError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufRead;

/// Data value used by OpenAI-compatible backends to mark the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

// ============================================================================
// SSE EVENT CONTAINER
// ============================================================================

/// One Server-Sent Event, assembled from the field lines preceding a blank line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>, // Optional event name (e.g., "message_start", "content_block_delta")

    pub data: Option<String>, // Payload; multiple `data:` lines are joined with '\n'

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>, // Reconnection delay in milliseconds
}

impl SseEvent {
    /// Build an event from the raw field lines of one event block.
    ///
    /// Comment lines (leading `:`), lines without a `:` and unknown field
    /// names are ignored. At most one space after the colon is stripped.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut event = SseEvent::default();

        for line in lines {
            let line = line.as_ref();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.strip_prefix(' ').unwrap_or(value);

            match field {
                "event" => event.event = Some(value.to_string()),
                "data" => match event.data.as_mut() {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => event.data = Some(value.to_string()),
                },
                "id" => event.id = Some(value.to_string()),
                // Non-numeric retry values are ignored
                "retry" => {
                    if let Ok(millis) = value.trim().parse::<u64>() {
                        event.retry = Some(millis);
                    }
                }
                _ => {}
            }
        }

        event
    }

    /// Check if this event represents the end of an OpenAI-style stream
    pub fn is_done(&self) -> bool {
        self.data.as_deref() == Some(DONE_SENTINEL)
    }

    /// Events without a data value and without an event name carry nothing
    /// and are never surfaced by [`SseReader`].
    pub fn is_empty(&self) -> bool {
        let no_data = self.data.as_deref().map_or(true, str::is_empty);
        let no_event = self.event.as_deref().map_or(true, str::is_empty);
        no_data && no_event
    }

    /// Check if this is an event-only SSE event (no data payload)
    pub fn is_event_only(&self) -> bool {
        self.event.is_some() && self.data.as_deref().map_or(true, str::is_empty)
    }
}

impl fmt::Display for SseEvent {
    /// Renders the event back into wire format, including the terminating blank line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(event) = &self.event {
            writeln!(f, "event: {}", event)?;
        }
        if let Some(data) = &self.data {
            for line in data.split('\n') {
                writeln!(f, "data: {}", line)?;
            }
        }
        if let Some(id) = &self.id {
            writeln!(f, "id: {}", id)?;
        }
        if let Some(retry) = self.retry {
            writeln!(f, "retry: {}", retry)?;
        }
        writeln!(f)
    }
}

// ============================================================================
// SSE READER
// ============================================================================

/// Pulls [`SseEvent`]s out of a blocking byte source.
///
/// The reader is lazy: each call to `next` reads only as many lines as it
/// takes to complete one non-empty event. After the source is exhausted or a
/// read fails, the iterator is fused and keeps returning `None`.
pub struct SseReader<R> {
    reader: R,
    pending: Vec<String>,
    line: Vec<u8>,
    finished: bool,
}

impl<R: BufRead> SseReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            line: Vec::new(),
            finished: false,
        }
    }

    /// Read the next non-empty event.
    ///
    /// Returns `Ok(None)` at end of input. A trailing event that was not
    /// followed by a blank line is still delivered before end of input.
    pub fn read_event(&mut self) -> Result<Option<SseEvent>, StreamError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.line.clear();
            let read = match self.reader.read_until(b'\n', &mut self.line) {
                Ok(read) => read,
                Err(err) => {
                    self.finished = true;
                    self.pending.clear();
                    return Err(StreamError::transport(err));
                }
            };

            if read == 0 {
                self.finished = true;
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let event = self.take_pending();
                return Ok((!event.is_empty()).then_some(event));
            }

            let text = String::from_utf8_lossy(&self.line);
            let text = text.trim_end_matches('\n').trim_end_matches('\r');

            if !text.is_empty() {
                self.pending.push(text.to_string());
                continue;
            }

            // Blank line: dispatch whatever has been collected so far
            if self.pending.is_empty() {
                continue;
            }
            let event = self.take_pending();
            if event.is_empty() {
                log::trace!("skipping empty sse event");
                continue;
            }
            return Ok(Some(event));
        }
    }

    /// Give back the underlying byte source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn take_pending(&mut self) -> SseEvent {
        let event = SseEvent::from_lines(self.pending.iter());
        self.pending.clear();
        event
    }
}

impl<R: BufRead> Iterator for SseReader<R> {
    type Item = Result<SseEvent, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_event().transpose()
    }
}

impl<'a> From<&'a [u8]> for SseReader<&'a [u8]> {
    fn from(bytes: &'a [u8]) -> Self {
        SseReader::new(bytes)
    }
}
