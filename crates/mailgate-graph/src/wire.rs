//! Wire documents for Microsoft Graph v1.0.
//!
//! Every document the gateway exchanges with the backend is a typed
//! struct here. The materialized message and its attachments are
//! whitelists by construction: only the fields the send endpoint
//! accepts are declared, so deserializing a draft read-back and
//! re-serializing it cannot carry a foreign key.

use serde::{Deserialize, Serialize};

/// A recipient item: `{ "emailAddress": { "address": ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    /// The wrapped address object.
    #[serde(rename = "emailAddress")]
    pub email_address: EmailAddress,
}

impl Recipient {
    /// Wraps a bare address into the Graph recipient shape.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            email_address: EmailAddress {
                address: address.into(),
                name: None,
            },
        }
    }
}

/// The inner address object of a recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// SMTP address.
    pub address: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A message body: `{ "contentType": "HTML"|"Text", "content": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemBody {
    /// `"HTML"` or `"Text"`.
    #[serde(rename = "contentType")]
    pub content_type: String,
    /// Body content.
    pub content: String,
}

impl ItemBody {
    /// Builds a body document.
    #[must_use]
    pub fn new(content: impl Into<String>, html: bool) -> Self {
        Self {
            content_type: if html { "HTML" } else { "Text" }.to_string(),
            content: content.into(),
        }
    }
}

/// Body of the draft create POST.
#[derive(Debug, Clone, Serialize)]
pub struct DraftMessage {
    /// Message subject (post-sanitize).
    pub subject: String,
    /// Message body (post-sanitize).
    pub body: ItemBody,
    /// Primary recipients.
    #[serde(rename = "toRecipients")]
    pub to_recipients: Vec<Recipient>,
    /// Secondary recipients.
    #[serde(rename = "ccRecipients", skip_serializing_if = "Vec::is_empty")]
    pub cc_recipients: Vec<Recipient>,
    /// Blind recipients.
    #[serde(rename = "bccRecipients", skip_serializing_if = "Vec::is_empty")]
    pub bcc_recipients: Vec<Recipient>,
}

/// Answer to the draft create POST; only the id matters.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftCreated {
    /// Backend-assigned message identifier.
    pub id: String,
}

/// A small attachment posted inline as base64.
#[derive(Debug, Clone, Serialize)]
pub struct FileAttachment {
    /// Always `#microsoft.graph.fileAttachment`.
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    /// Sanitized file name.
    pub name: String,
    /// MIME content type.
    #[serde(rename = "contentType")]
    pub content_type: String,
    /// Base64-encoded file content.
    #[serde(rename = "contentBytes")]
    pub content_bytes: String,
    /// Whether the attachment is referenced inline from the body.
    #[serde(rename = "isInline")]
    pub is_inline: bool,
    /// Content id for inline references.
    #[serde(rename = "contentId", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// The `attachmentItem` describing an upload-session attachment.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentItem {
    /// Always `"file"`.
    #[serde(rename = "attachmentType")]
    pub attachment_type: String,
    /// Sanitized file name.
    pub name: String,
    /// Declared total size in bytes.
    pub size: u64,
    /// Whether the attachment is referenced inline from the body.
    #[serde(rename = "isInline", skip_serializing_if = "std::ops::Not::not")]
    pub is_inline: bool,
    /// Content id for inline references.
    #[serde(rename = "contentId", skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Body of the `createUploadSession` POST.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUploadSession {
    /// The attachment being described.
    #[serde(rename = "AttachmentItem")]
    pub attachment_item: AttachmentItem,
}

/// Answer to `createUploadSession`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSessionCreated {
    /// Pre-authenticated URL accepting the chunk PUTs.
    #[serde(rename = "uploadUrl")]
    pub upload_url: String,
}

/// Body returned by a chunk PUT while the upload is in progress.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadChunkAck {
    /// Byte ranges the backend still expects; empty or absent means the
    /// upload is complete.
    #[serde(rename = "nextExpectedRanges", default)]
    pub next_expected_ranges: Vec<String>,
}

/// The materialized message, whitelisted to the fields the send
/// endpoint accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanMessage {
    /// Subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ItemBody>,
    /// Primary recipients.
    #[serde(rename = "toRecipients", default, skip_serializing_if = "Option::is_none")]
    pub to_recipients: Option<Vec<Recipient>>,
    /// Secondary recipients.
    #[serde(rename = "ccRecipients", default, skip_serializing_if = "Option::is_none")]
    pub cc_recipients: Option<Vec<Recipient>>,
    /// Blind recipients.
    #[serde(rename = "bccRecipients", default, skip_serializing_if = "Option::is_none")]
    pub bcc_recipients: Option<Vec<Recipient>>,
    /// Reply-to recipients.
    #[serde(rename = "replyTo", default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Vec<Recipient>>,
    /// Sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Recipient>,
    /// Importance marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<String>,
    /// Attachments, each whitelisted to the fields below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<CleanAttachment>>,
}

/// One materialized attachment, whitelisted for re-submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanAttachment {
    /// Attachment OData type.
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
    /// File name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME content type.
    #[serde(rename = "contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 content.
    #[serde(rename = "contentBytes", default, skip_serializing_if = "Option::is_none")]
    pub content_bytes: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Inline flag.
    #[serde(rename = "isInline", default, skip_serializing_if = "Option::is_none")]
    pub is_inline: Option<bool>,
    /// Content id for inline references.
    #[serde(rename = "contentId", default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Body of the `sendMail` POST.
#[derive(Debug, Clone, Serialize)]
pub struct SendMailRequest {
    /// The materialized message.
    pub message: CleanMessage,
    /// Whether to keep a copy in Sent Items.
    #[serde(rename = "saveToSentItems")]
    pub save_to_sent_items: bool,
}

/// A Graph error document: `{ "error": { "code", "message" } }`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorBody {
    /// The inner error object.
    pub error: GraphErrorDetail,
}

/// The inner object of a Graph error document.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorDetail {
    /// Machine-readable code (e.g. `ErrorItemNotFound`).
    pub code: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

/// One page of a message listing.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePage {
    /// The messages on this page.
    pub value: Vec<MessageDto>,
}

/// An inbox message returned by [`crate::Sender::receive`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    /// Backend message identifier.
    pub id: String,
    /// Subject.
    #[serde(default)]
    pub subject: Option<String>,
    /// Body.
    #[serde(default)]
    pub body: Option<ItemBody>,
    /// Delivery timestamp (RFC 3339).
    #[serde(rename = "receivedDateTime", default)]
    pub received_date_time: Option<String>,
    /// Read marker as returned by the listing (always false here).
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    /// Whether the message carries attachments.
    #[serde(rename = "hasAttachments", default)]
    pub has_attachments: bool,
    /// Deep link into the mailbox UI.
    #[serde(rename = "webLink", default)]
    pub web_link: Option<String>,
    /// Primary recipients.
    #[serde(rename = "toRecipients", default)]
    pub to_recipients: Vec<Recipient>,
    /// Secondary recipients.
    #[serde(rename = "ccRecipients", default)]
    pub cc_recipients: Vec<Recipient>,
    /// Blind recipients.
    #[serde(rename = "bccRecipients", default)]
    pub bcc_recipients: Vec<Recipient>,
    /// Transport headers.
    #[serde(rename = "internetMessageHeaders", default)]
    pub internet_message_headers: Vec<InternetMessageHeader>,
    /// Hydrated attachments (filled by the receive path).
    #[serde(default)]
    pub attachments: Vec<AttachmentDto>,
}

/// One transport header of a received message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternetMessageHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// One page of an attachment listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPage {
    /// The attachments on this page.
    pub value: Vec<RawAttachment>,
}

/// An attachment as listed by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAttachment {
    /// Attachment identifier.
    pub id: String,
    /// File name.
    #[serde(default)]
    pub name: Option<String>,
    /// MIME content type.
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
    /// Fallback content type for reference attachments.
    #[serde(rename = "@odata.mediaContentType", default)]
    pub media_content_type: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Inline flag.
    #[serde(rename = "isInline", default)]
    pub is_inline: bool,
    /// Base64 content.
    #[serde(rename = "contentBytes", default)]
    pub content_bytes: Option<String>,
}

/// A hydrated attachment of a received message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentDto {
    /// Attachment identifier.
    pub id: String,
    /// File name.
    pub name: Option<String>,
    /// MIME content type (falls back to `@odata.mediaContentType`).
    pub content_type: Option<String>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Inline flag.
    pub is_inline: bool,
    /// Base64 content.
    pub content_bytes: Option<String>,
}

impl From<RawAttachment> for AttachmentDto {
    fn from(raw: RawAttachment) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            content_type: raw.content_type.or(raw.media_content_type),
            size: raw.size,
            is_inline: raw.is_inline,
            content_bytes: raw.content_bytes,
        }
    }
}
