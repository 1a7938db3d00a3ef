//! HTTP transport abstraction.
//!
//! The gateway consumes an opaque sender capable of one operation:
//! `send(request) -> response`. The default implementation wraps a
//! shared `reqwest::Client`; hosts may inject their own client (the
//! library only shares the handle and never tears an injected client
//! down) or a custom transport.

use async_trait::async_trait;

/// An opaque HTTP sender.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one request and resolves to its response.
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response>;
}

/// Transport backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport sharing an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.client.execute(request).await
    }
}
