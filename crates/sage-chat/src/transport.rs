//! Transport abstraction for opening completion streams

use async_trait::async_trait;
use sage_ai::{ByteStream, ChatClient, ChatRequest, ClientConfig, Result};

/// Opens the response body for one request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request; a non-success status must be an error
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;
}

/// Transport backed by the HTTP endpoint client
pub struct HttpTransport {
    client: ChatClient,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: ChatClient::new(config),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.client.open(request).await
    }
}
