//! Streaming chat completions client

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

use crate::{
    config::ClientConfig,
    decoder::{self, Delta},
    error::{Error, Result},
    types::{ChatRequest, Turn},
};

/// Raw response body chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Formatted deltas decoded from a response body
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<Delta>> + Send>>;

/// HTTP client for one configured completion endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the request body for a conversation
    pub fn build_request(&self, messages: Vec<Turn>) -> ChatRequest {
        ChatRequest::new(self.config.model(), messages, self.config.params())
    }

    /// Send a request and return the raw response body.
    ///
    /// Non-success statuses become [`Error::Http`] carrying the body text.
    pub async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        tracing::debug!(
            "POST {} ({} messages, model {})",
            self.config.endpoint(),
            request.messages.len(),
            request.model
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .query(&[("api-version", self.config.api_version())])
            .bearer_auth(self.config.api_key())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Endpoint returned {}: {}", status, body);
            return Err(Error::http(status.as_u16(), body));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::StreamRead(e.to_string())));
        Ok(Box::pin(body))
    }

    /// Send a request and decode the response into formatted deltas
    pub async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream> {
        let body = self.open(request).await?;
        Ok(Box::pin(decoder::decode(body)))
    }
}
