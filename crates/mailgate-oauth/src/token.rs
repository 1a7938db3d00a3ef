//! Access token types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Safety buffer subtracted from the expiry when judging usability.
///
/// A token within 30 seconds of expiry is treated as stale so that a
/// request built around it cannot arrive at the backend expired.
const EXPIRY_SAFETY_BUFFER_SECS: i64 = 30;

/// An app-only access token with its expiry instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// Opaque bearer string.
    pub access_token: String,
    /// Instant at which the backend considers the token expired.
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Creates a token expiring at the given instant.
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Creates a token from a token endpoint response.
    #[must_use]
    pub fn from_response(response: TokenResponse) -> Self {
        let expires_at = Utc::now() + Duration::seconds(i64::from(response.expires_in));
        Self {
            access_token: response.access_token,
            expires_at,
        }
    }

    /// Returns true if the token is still usable.
    ///
    /// A token is usable only while `now + 30s < expires_at`.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_SAFETY_BUFFER_SECS) < self.expires_at
    }
}

/// Token response from the `OAuth2` token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (always "Bearer" for this grant).
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    pub expires_in: u32,
}

/// Error response from the `OAuth2` token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
    /// Error description.
    #[serde(default)]
    pub error_description: String,
}

impl ErrorResponse {
    /// Converts to an [`crate::Error`].
    #[must_use]
    pub fn into_error(self) -> crate::Error {
        crate::Error::oauth_error(self.error, self.error_description)
    }
}
