//! Error types for the mail gateway.
//!
//! Every failure mode of the send pipeline maps to one variant here.
//! Backend failures carry the Graph `error.code`/`error.message` pair
//! when the response body is a Graph error document, and a truncated
//! body prefix otherwise. Attachment failures additionally carry the
//! file name and the byte offset reached.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of response-body bytes carried in errors and logs.
pub(crate) const BODY_SNIPPET_MAX_BYTES: usize = 500;

/// Errors that can occur while sending or receiving mail.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value failed validation. No backend call was made.
    #[error("Invalid {field}: {message}")]
    Argument {
        /// The offending field (e.g. `to`, `attachment`).
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Token acquisition failed. Never retried at this layer.
    #[error("Authentication failed: {0}")]
    Auth(#[source] mailgate_oauth::Error),

    /// The draft create POST did not succeed after retries.
    #[error("Failed to create draft: {0}")]
    CreateMessage(ApiFailure),

    /// An attachment could not be committed to the draft.
    #[error("Attachment '{name}' failed at offset {offset}: {source}")]
    Attachment {
        /// Declared file name of the attachment.
        name: String,
        /// Byte offset reached before the failure.
        offset: u64,
        /// What went wrong.
        #[source]
        source: AttachmentFailure,
    },

    /// The draft read-back did not succeed or did not parse.
    #[error("Failed to materialize draft: {0}")]
    Materialize(ApiFailure),

    /// The sendMail POST did not succeed after retries.
    #[error("Failed to send message: {0}")]
    SendMessage(ApiFailure),

    /// The draft DELETE did not succeed after retries.
    #[error("Failed to delete draft: {0}")]
    DeleteDraft(ApiFailure),

    /// The operation failed and the draft cleanup failed as well.
    #[error("{operation}; additionally, draft cleanup failed: {cleanup}")]
    Aggregate {
        /// The error from the main operation.
        operation: Box<Error>,
        /// The error from the cleanup step.
        cleanup: Box<Error>,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// The inbox listing did not succeed.
    #[error("Failed to list inbox: {0}")]
    Receive(ApiFailure),

    /// Transport-level error that exhausted the retry budget.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error while building a request document.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates an argument error naming the offending field.
    #[must_use]
    pub fn argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Argument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true if this error is a caller-triggered cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<mailgate_oauth::Error> for Error {
    fn from(err: mailgate_oauth::Error) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Auth(err)
        }
    }
}

/// A non-success answer from the backend.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    /// HTTP status, when a response was received.
    pub status: Option<reqwest::StatusCode>,
    /// Graph `error.code`, when the body was a Graph error document.
    pub code: Option<String>,
    /// Graph `error.message`, or a truncated body prefix.
    pub message: String,
}

impl ApiFailure {
    /// Builds a failure from a non-success response, decoding the Graph
    /// error document when present.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::from_status_and_body(status, &body)
    }

    pub(crate) fn from_status_and_body(status: reqwest::StatusCode, body: &str) -> Self {
        match serde_json::from_str::<crate::wire::GraphErrorBody>(body) {
            Ok(parsed) => Self {
                status: Some(status),
                code: Some(parsed.error.code),
                message: parsed.error.message,
            },
            Err(_) => Self {
                status: Some(status),
                code: None,
                message: truncate_body(body),
            },
        }
    }

    /// Builds a failure from a response-decoding error.
    pub(crate) fn from_decode(err: &reqwest::Error) -> Self {
        Self {
            status: err.status(),
            code: None,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "status {status}")?,
            None => write!(f, "no response")?,
        }
        if let Some(ref code) = self.code {
            write!(f, ", code {code}")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiFailure {}

/// What went wrong with one attachment.
#[derive(Debug, Error)]
pub enum AttachmentFailure {
    /// The backend rejected an attachment call.
    #[error("{0}")]
    Api(ApiFailure),

    /// Reading the attachment file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file ended before the declared size was read.
    #[error("file truncated at the source: expected {expected} bytes")]
    Truncated {
        /// Size declared when the upload session was created.
        expected: u64,
    },

    /// The chunk loop finished without committing the declared size.
    #[error("upload incomplete: committed {committed} of {expected} bytes")]
    Incomplete {
        /// Bytes the backend acknowledged.
        committed: u64,
        /// Size declared when the upload session was created.
        expected: u64,
    },

    /// The upload session was lost repeatedly and the attempt budget ran out.
    #[error("upload session lost after {sessions} attempts for draft {draft_id}: {last}")]
    SessionExhausted {
        /// Upload sessions attempted.
        sessions: u32,
        /// Draft the attachment belonged to.
        draft_id: String,
        /// The session-loss answer from the backend.
        last: ApiFailure,
    },
}

/// Truncates a response body for error payloads and retry telemetry.
pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= BODY_SNIPPET_MAX_BYTES {
        return trimmed.to_string();
    }
    let mut end = BODY_SNIPPET_MAX_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…[truncated {} bytes]", &trimmed[..end], trimmed.len())
}
