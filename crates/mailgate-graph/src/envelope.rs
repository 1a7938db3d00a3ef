//! Outbound message model and validation.

use crate::config::SendOptions;
use crate::error::{Error, Result};
use mailgate_sanitize::{is_valid_address, sanitize_filename, sanitize_html, sanitize_subject};
use std::path::PathBuf;

/// Fallback MIME type for attachments without an override.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One attachment of an outbound message.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    /// Declared file name.
    pub name: String,
    /// Local path of the file to attach.
    pub path: PathBuf,
    /// Whether the attachment is referenced inline from the body.
    pub is_inline: bool,
    /// Content id for inline references; required when `is_inline`.
    pub content_id: Option<String>,
    /// MIME content type override.
    pub content_type: Option<String>,
}

impl EmailAttachment {
    /// Creates an attachment for the given file.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_inline: false,
            content_id: None,
            content_type: None,
        }
    }

    /// Marks the attachment as inline under the given content id.
    #[must_use]
    pub fn inline(mut self, content_id: impl Into<String>) -> Self {
        self.is_inline = true;
        self.content_id = Some(content_id.into());
        self
    }

    /// Overrides the MIME content type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// An outbound message.
#[derive(Debug, Clone, Default)]
pub struct MailEnvelope {
    /// Primary recipients.
    pub to: Vec<String>,
    /// Secondary recipients.
    pub cc: Vec<String>,
    /// Blind recipients.
    pub bcc: Vec<String>,
    /// Subject (sanitized during validation).
    pub subject: String,
    /// Body (sanitized during validation when HTML).
    pub body: String,
    /// Whether the body is HTML.
    pub body_is_html: bool,
    /// Attachments in declaration order.
    pub attachments: Vec<EmailAttachment>,
    /// Explicit sender address; defaults to the configured mailbox.
    pub from: Option<String>,
    /// Caller-supplied correlation identifier for log scoping.
    pub correlation_id: Option<String>,
}

impl MailEnvelope {
    /// Creates an envelope with the given primary recipients.
    #[must_use]
    pub fn new<I, S>(to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            to: to.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Adds secondary recipients.
    #[must_use]
    pub fn cc<I, S>(mut self, cc: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc.extend(cc.into_iter().map(Into::into));
        self
    }

    /// Adds blind recipients.
    #[must_use]
    pub fn bcc<I, S>(mut self, bcc: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bcc.extend(bcc.into_iter().map(Into::into));
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets a plain-text body.
    #[must_use]
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.body_is_html = false;
        self
    }

    /// Sets an HTML body.
    #[must_use]
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.body_is_html = true;
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Overrides the sender address.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Attaches a correlation identifier to all log events of the send.
    #[must_use]
    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// A validated, sanitized message ready for the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedMail {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub body_is_html: bool,
    pub from: String,
    pub attachments: Vec<ValidatedAttachment>,
}

/// A validated attachment with its measured size.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedAttachment {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub is_inline: bool,
    pub content_id: Option<String>,
    pub content_type: String,
}

/// Validates and sanitizes an envelope.
///
/// Checks run in order: recipients, sender, subject/body sanitization,
/// then the attachment group (existence, non-zero size, inline content
/// ids, aggregate cap). Any violation fails the send before the first
/// backend call.
pub(crate) async fn validate(
    envelope: &MailEnvelope,
    options: &SendOptions,
    default_sender: &str,
) -> Result<ValidatedMail> {
    if envelope.to.is_empty() {
        return Err(Error::argument("to", "at least one recipient is required"));
    }
    check_addresses("to", &envelope.to)?;
    check_addresses("cc", &envelope.cc)?;
    check_addresses("bcc", &envelope.bcc)?;

    let from = envelope
        .from
        .clone()
        .unwrap_or_else(|| default_sender.to_string());
    if !is_valid_address(&from) {
        return Err(Error::argument("from", format!("invalid address '{from}'")));
    }

    let subject = sanitize_subject(&envelope.subject);
    let body = if envelope.body_is_html {
        sanitize_html(&envelope.body)
    } else {
        envelope.body.clone()
    };

    let mut attachments = Vec::with_capacity(envelope.attachments.len());
    let mut total_size: u64 = 0;
    for attachment in &envelope.attachments {
        let name = sanitize_filename(&attachment.name);
        if name.is_empty() {
            return Err(Error::argument(
                "attachment",
                format!("file name '{}' is empty after sanitization", attachment.name),
            ));
        }

        if attachment.is_inline
            && attachment
                .content_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            return Err(Error::argument(
                "attachment",
                format!("inline attachment '{name}' requires a content id"),
            ));
        }

        let metadata = tokio::fs::metadata(&attachment.path).await.map_err(|err| {
            Error::argument(
                "attachment",
                format!("file '{}' is not readable: {err}", attachment.path.display()),
            )
        })?;
        if !metadata.is_file() {
            return Err(Error::argument(
                "attachment",
                format!("'{}' is not a regular file", attachment.path.display()),
            ));
        }
        if metadata.len() == 0 {
            return Err(Error::argument(
                "attachment",
                format!("file '{}' is empty", attachment.path.display()),
            ));
        }

        total_size = total_size.saturating_add(metadata.len());
        attachments.push(ValidatedAttachment {
            name,
            path: attachment.path.clone(),
            size: metadata.len(),
            is_inline: attachment.is_inline,
            content_id: attachment.content_id.clone(),
            content_type: attachment
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        });
    }

    if total_size > options.max_total_attachment_size {
        return Err(Error::argument(
            "attachments",
            format!(
                "aggregate attachment size {total_size} exceeds the cap of {} bytes",
                options.max_total_attachment_size
            ),
        ));
    }

    Ok(ValidatedMail {
        to: envelope.to.clone(),
        cc: envelope.cc.clone(),
        bcc: envelope.bcc.clone(),
        subject,
        body,
        body_is_html: envelope.body_is_html,
        from,
        attachments,
    })
}

fn check_addresses(field: &str, addresses: &[String]) -> Result<()> {
    for address in addresses {
        if !is_valid_address(address) {
            return Err(Error::argument(field, format!("invalid address '{address}'")));
        }
    }
    Ok(())
}
