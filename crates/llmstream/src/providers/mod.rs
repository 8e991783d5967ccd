//! Backend identification and the unified response stream.
//!
//! Every backend's events are interpreted into the same
//! [`ResponseFragment`] shape, so callers only ever see one stream type.
pub mod id;
pub mod interpreter;
pub mod response;
pub mod streaming_response;

pub use id::ProviderId;
pub use interpreter::{EventInterpreter, Interpretation, StreamInterpreter};
pub use response::{ChoiceDelta, DeltaMessage, ResponseFragment, Role};
pub use streaming_response::{ResponseStream, SseResponseStream};
