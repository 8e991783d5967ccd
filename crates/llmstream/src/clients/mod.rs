pub mod config;
pub mod endpoints;
#[cfg(feature = "client")]
pub mod http;
pub mod request;

pub use config::{ClientConfig, ProvidersConfig};
pub use endpoints::{stream_endpoint, stream_headers};
#[cfg(feature = "client")]
pub use http::{HttpResponseStream, StreamingClient};
pub use request::{ChatRequest, Message};
