//! Identity provider configuration.

use crate::error::{Error, Result};
use url::Url;

/// Default scope for app-only Microsoft Graph access.
pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Token endpoint configuration for one tenant.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Token endpoint URL.
    pub token_url: Url,
    /// Scope requested with the client-credentials grant.
    pub scope: String,
}

impl Provider {
    /// Creates a provider for a Microsoft Entra tenant.
    ///
    /// The token endpoint is derived from the tenant identifier:
    /// `https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant id is empty or produces an
    /// invalid URL.
    pub fn microsoft(tenant_id: impl AsRef<str>) -> Result<Self> {
        let tenant_id = tenant_id.as_ref().trim();
        if tenant_id.is_empty() {
            return Err(Error::InvalidConfig("tenant id must not be empty".into()));
        }

        let token_url = Url::parse(&format!(
            "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"
        ))?;

        Ok(Self {
            token_url,
            scope: GRAPH_DEFAULT_SCOPE.to_string(),
        })
    }

    /// Overrides the token endpoint URL. Intended for tests.
    #[must_use]
    pub fn with_token_url(mut self, token_url: Url) -> Self {
        self.token_url = token_url;
        self
    }

    /// Overrides the requested scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}
