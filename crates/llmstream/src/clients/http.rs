use ureq::Agent;

use crate::clients::config::ClientConfig;
use crate::clients::endpoints::{stream_endpoint, stream_headers};
use crate::clients::request::ChatRequest;
use crate::errors::{ErrorKind, StreamError};
use crate::providers::id::ProviderId;
use crate::providers::streaming_response::SseResponseStream;

/// Stream over a live HTTP response body.
pub type HttpResponseStream = SseResponseStream<ureq::BodyReader<'static>>;

/// Blocking client that opens streaming completions against one backend.
#[derive(Clone)]
pub struct StreamingClient {
    provider: ProviderId,
    config: ClientConfig,
    agent: Agent,
}

impl StreamingClient {
    pub fn new(provider: ProviderId, config: ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;

        let agent_config = Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            provider,
            config,
            agent: Agent::new_with_config(agent_config),
        })
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `request` and return a stream over the response.
    ///
    /// Non-success statuses are mapped through the provider's error table
    /// before any fragment is produced.
    pub fn complete_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<HttpResponseStream, StreamError> {
        request.validate()?;
        let body = request.to_stream_body(self.provider)?;
        let url = stream_endpoint(self.provider, &self.config, &request.model);

        log::debug!(
            "opening {} stream for model {} ({} messages)",
            self.provider,
            request.model,
            request.messages.len()
        );

        let mut builder = self.agent.post(&url);
        for (name, value) in stream_headers(self.provider, &self.config) {
            builder = builder.header(name, value);
        }

        let mut response = builder.send_json(&body).map_err(request_error)?;
        let status = response.status().as_u16();

        if status != 200 {
            let text = response.body_mut().read_to_string().unwrap_or_else(|err| {
                log::debug!("failed to read {} error body: {}", self.provider, err);
                String::new()
            });
            log::warn!("{} returned status {}", self.provider, status);
            return Err(self.provider.map_error_response(status, &text));
        }

        Ok(SseResponseStream::for_provider(
            self.provider,
            &request.model,
            response.into_body().into_reader(),
        ))
    }
}

fn request_error(err: ureq::Error) -> StreamError {
    match err {
        ureq::Error::Timeout(_) => {
            StreamError::with_source(ErrorKind::Timeout, "request timed out", err)
        }
        ureq::Error::Io(io) => StreamError::transport(io),
        other => StreamError::with_source(ErrorKind::Connection, "request failed", other),
    }
}
