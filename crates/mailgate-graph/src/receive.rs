//! Inbox receive path.
//!
//! Lists unread messages, hydrates their attachments, and marks them
//! read. Attachment hydration and the read marker are best-effort per
//! message; a failure there is logged and never aborts the batch.

use crate::config::SendOptions;
use crate::error::{ApiFailure, Error, Result};
use crate::sender::Sender;
use crate::wire::{AttachmentDto, AttachmentPage, MessageDto, MessagePage};
use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Projection selected for the unread listing.
const MESSAGE_SELECT_FIELDS: &str = concat!(
    "id,subject,body,receivedDateTime,isRead,hasAttachments,webLink,",
    "toRecipients,ccRecipients,bccRecipients,internetMessageHeaders"
);

/// Page size of the unread listing.
const PAGE_SIZE: &str = "100";

impl Sender {
    /// Fetches unread inbox messages and marks them read.
    ///
    /// `mailbox` overrides the configured default mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing itself fails or the caller
    /// cancels. Per-message attachment and mark-read failures are
    /// logged and skipped.
    pub async fn receive(
        &self,
        mailbox: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<MessageDto>> {
        let options = SendOptions::default();
        let mailbox = mailbox.unwrap_or_else(|| self.default_mailbox());

        let mut url = self.user_url(mailbox, &["mailFolders", "inbox", "messages"])?;
        url.query_pairs_mut()
            .append_pair("$filter", "isRead eq false")
            .append_pair("$select", MESSAGE_SELECT_FIELDS)
            .append_pair("$top", PAGE_SIZE);

        let response = self
            .authed_request(Method::GET, &url, None, &options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::Receive(ApiFailure::from_response(response).await));
        }
        let page: MessagePage = response
            .json()
            .await
            .map_err(|err| Error::Receive(ApiFailure::from_decode(&err)))?;

        let mut messages = page.value;
        for message in &mut messages {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if message.has_attachments {
                match self
                    .fetch_attachments(mailbox, &message.id, &options, cancel)
                    .await
                {
                    Ok(attachments) => message.attachments = attachments,
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) => {
                        tracing::warn!(
                            message_id = %message.id,
                            error = %err,
                            "failed to hydrate attachments"
                        );
                    }
                }
            }

            if let Err(err) = self.mark_read(mailbox, &message.id, &options, cancel).await {
                if err.is_cancelled() {
                    return Err(err);
                }
                tracing::warn!(
                    message_id = %message.id,
                    error = %err,
                    "failed to mark message read"
                );
            }
        }

        Ok(messages)
    }

    async fn fetch_attachments(
        &self,
        mailbox: &str,
        message_id: &str,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttachmentDto>> {
        let url = self.user_url(mailbox, &["messages", message_id, "attachments"])?;
        let response = self
            .authed_request(Method::GET, &url, None, options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::Receive(ApiFailure::from_response(response).await));
        }

        let page: AttachmentPage = response
            .json()
            .await
            .map_err(|err| Error::Receive(ApiFailure::from_decode(&err)))?;
        Ok(page.value.into_iter().map(AttachmentDto::from).collect())
    }

    async fn mark_read(
        &self,
        mailbox: &str,
        message_id: &str,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = self.user_url(mailbox, &["messages", message_id])?;
        let response = self
            .authed_request(
                Method::PATCH,
                &url,
                Some(json!({ "isRead": true })),
                options,
                cancel,
            )
            .await?;
        if !response.status().is_success() {
            return Err(Error::Receive(ApiFailure::from_response(response).await));
        }
        Ok(())
    }
}
