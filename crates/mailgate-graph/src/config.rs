//! Sender configuration types.

use crate::error::{Error, Result};
use std::time::Duration;

/// Default threshold separating inline-POST attachments from
/// upload-session streamed attachments.
pub const DEFAULT_LARGE_THRESHOLD: u64 = 3 * 1024 * 1024;

/// Default chunk size for upload sessions.
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Default cap on the aggregate size of all attachments of one send.
///
/// The materialize step re-reads every attachment from the backend as
/// base64, so the aggregate cap bounds the size of that payload.
pub const DEFAULT_MAX_TOTAL_ATTACHMENT_SIZE: u64 = 35 * 1024 * 1024;

/// Application identity and default mailbox for one sender.
///
/// Immutable once constructed; owned by the long-lived [`crate::Sender`].
/// The library never persists the secret.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Entra tenant identifier.
    pub tenant_id: String,
    /// Application (client) identifier.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Default sender mailbox address.
    pub mailbox: String,
}

impl AuthConfig {
    /// Creates a new configuration.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        mailbox: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            mailbox: mailbox.into(),
        }
    }

    /// Loads the configuration from the environment.
    ///
    /// Reads `MAILGATE_TENANT_ID`, `MAILGATE_CLIENT_ID`,
    /// `MAILGATE_CLIENT_SECRET`, and `MAILGATE_MAILBOX`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            tenant_id: require_env("MAILGATE_TENANT_ID")?,
            client_id: require_env("MAILGATE_CLIENT_ID")?,
            client_secret: require_env("MAILGATE_CLIENT_SECRET")?,
            mailbox: require_env("MAILGATE_MAILBOX")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::Config(format!("missing environment variable {name}")))
}

/// Per-send tuning knobs.
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Per-request timeout; `None` leaves the transport default.
    pub request_timeout: Option<Duration>,
    /// Attachments at or below this size are posted inline as base64.
    pub large_threshold: u64,
    /// Bytes per upload-session chunk.
    pub chunk_size: usize,
    /// Maximum aggregate size of all attachments.
    pub max_total_attachment_size: u64,
    /// Whether the sent message is kept in the mailbox's Sent Items.
    pub save_to_sent_items: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            request_timeout: None,
            large_threshold: DEFAULT_LARGE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_total_attachment_size: DEFAULT_MAX_TOTAL_ATTACHMENT_SIZE,
            save_to_sent_items: false,
        }
    }
}

impl SendOptions {
    /// Creates options with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the large-attachment threshold.
    #[must_use]
    pub const fn large_threshold(mut self, bytes: u64) -> Self {
        self.large_threshold = bytes;
        self
    }

    /// Sets the upload chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Sets the aggregate attachment size cap.
    #[must_use]
    pub const fn max_total_attachment_size(mut self, bytes: u64) -> Self {
        self.max_total_attachment_size = bytes;
        self
    }

    /// Sets whether the sent message is kept in Sent Items.
    #[must_use]
    pub const fn save_to_sent_items(mut self, save: bool) -> Self {
        self.save_to_sent_items = save;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = SendOptions::default();
        assert_eq!(options.large_threshold, 3 * 1024 * 1024);
        assert_eq!(options.chunk_size, 5 * 1024 * 1024);
        assert_eq!(options.max_total_attachment_size, 35 * 1024 * 1024);
        assert!(!options.save_to_sent_items);
        assert!(options.request_timeout.is_none());
    }

    #[test]
    fn test_builder() {
        let options = SendOptions::new()
            .request_timeout(Duration::from_secs(20))
            .large_threshold(1024)
            .chunk_size(2048)
            .max_total_attachment_size(4096)
            .save_to_sent_items(true);

        assert_eq!(options.request_timeout, Some(Duration::from_secs(20)));
        assert_eq!(options.large_threshold, 1024);
        assert_eq!(options.chunk_size, 2048);
        assert_eq!(options.max_total_attachment_size, 4096);
        assert!(options.save_to_sent_items);
    }
}
