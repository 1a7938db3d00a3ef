//! Client-credentials grant (RFC 6749 §4.4).

use crate::error::Result;
use crate::provider::Provider;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use std::collections::HashMap;

/// Client-credentials flow for application-only identities.
///
/// Authentication failures from the token endpoint are surfaced as-is;
/// this layer never retries them.
#[derive(Debug, Clone)]
pub struct ClientCredentialsFlow {
    /// Client (application) ID.
    client_id: String,
    /// Client secret.
    client_secret: String,
    /// Provider configuration.
    provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl ClientCredentialsFlow {
    /// Creates a new flow.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            provider,
            http_client: Client::new(),
        }
    }

    /// Uses the given HTTP client instead of a fresh one.
    #[must_use]
    pub fn with_http_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Requests a fresh token from the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the endpoint rejects
    /// the credentials.
    pub async fn request_token(&self) -> Result<Token> {
        let mut params = HashMap::new();
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("scope", self.provider.scope.as_str());
        params.insert("grant_type", "client_credentials");

        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token_response.expires_in, "acquired app-only token");
        Ok(Token::from_response(token_response))
    }
}
