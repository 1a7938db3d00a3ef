//! The sender instance and the send orchestration.
//!
//! One [`Sender`] is configured with one [`AuthConfig`] and is safe to
//! use concurrently for multiple sends. A send threads a message
//! through a linear pipeline: validate, create draft, attach,
//! materialize, send, cleanup. The draft is removed in every outcome,
//! including errors and cancellation.

use crate::config::{AuthConfig, SendOptions};
use crate::envelope::{self, MailEnvelope, ValidatedMail};
use crate::error::{ApiFailure, AttachmentFailure, Error, Result};
use crate::retry::{self, RetryPolicy};
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::upload::BufferPool;
use crate::wire::{DraftCreated, DraftMessage, FileAttachment, ItemBody, Recipient, SendMailRequest};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mailgate_oauth::{ClientCredentialsFlow, Provider, TokenCache};
use reqwest::Method;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;
use url::Url;

/// Base URL of the mail backend.
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0/";

/// OData type tag for inline-posted file attachments.
const FILE_ATTACHMENT_ODATA_TYPE: &str = "#microsoft.graph.fileAttachment";

/// A long-lived mail gateway bound to one application identity.
pub struct Sender {
    auth: AuthConfig,
    tokens: TokenCache,
    transport: Arc<dyn HttpTransport>,
    http: reqwest::Client,
    retry: RetryPolicy,
    buffers: BufferPool,
    base_url: Url,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("auth", &self.auth)
            .field("tokens", &self.tokens)
            .field("retry", &self.retry)
            .field("buffers", &self.buffers)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Handle to a draft created on the backend.
///
/// Owned by one in-flight send; the cleanup step consumes it at the end
/// of the pipeline regardless of how the rest went.
#[derive(Debug, Clone)]
pub(crate) struct DraftHandle {
    /// Backend-assigned message identifier.
    pub id: String,
    /// Mailbox segment the draft lives under.
    pub mailbox: String,
    /// True once the draft POST succeeded.
    pub created_on_server: bool,
}

impl Sender {
    /// Creates a sender owning a fresh HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant configuration is invalid.
    pub fn new(auth: AuthConfig) -> Result<Self> {
        let client = reqwest::Client::new();
        let transport = Arc::new(ReqwestTransport::with_client(client.clone()));
        Self::build(auth, client, transport)
    }

    /// Creates a sender sharing an injected HTTP client.
    ///
    /// The client handle is shared, never shut down by the library.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant configuration is invalid.
    pub fn with_client(auth: AuthConfig, client: reqwest::Client) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::with_client(client.clone()));
        Self::build(auth, client, transport)
    }

    /// Creates a sender with a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant configuration is invalid.
    pub fn with_transport(auth: AuthConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        Self::build(auth, reqwest::Client::new(), transport)
    }

    fn build(
        auth: AuthConfig,
        http: reqwest::Client,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let provider = Provider::microsoft(&auth.tenant_id)?;
        let flow =
            ClientCredentialsFlow::new(auth.client_id.clone(), auth.client_secret.clone(), provider)
                .with_http_client(http.clone());

        Ok(Self {
            auth,
            tokens: TokenCache::new(flow),
            transport,
            http,
            retry: RetryPolicy::new(),
            buffers: BufferPool::new(),
            base_url: Url::parse(GRAPH_BASE_URL).map_err(|err| Error::Config(err.to_string()))?,
        })
    }

    /// Overrides the backend base URL. Intended for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot serve as a base.
    pub fn with_base_url(mut self, base_url: Url) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::Config("base URL cannot be a base".into()));
        }
        self.base_url = base_url;
        Ok(self)
    }

    /// Overrides the token endpoint URL. Intended for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant configuration is invalid.
    pub fn with_token_url(mut self, token_url: Url) -> Result<Self> {
        let provider = Provider::microsoft(&self.auth.tenant_id)?.with_token_url(token_url);
        let flow = ClientCredentialsFlow::new(
            self.auth.client_id.clone(),
            self.auth.client_secret.clone(),
            provider,
        )
        .with_http_client(self.http.clone());
        self.tokens = TokenCache::new(flow);
        Ok(self)
    }

    /// Sends a message through the draft/attach/materialize/send
    /// pipeline and removes the draft afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error for validation failures, any pipeline step that
    /// fails after retries, cancellation, or an aggregate of both when
    /// the operation and the cleanup fail together.
    pub async fn send(
        &self,
        envelope: &MailEnvelope,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let correlation_id = envelope
            .correlation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span = tracing::info_span!("send_mail", correlation_id = %correlation_id);
        self.send_inner(envelope, options, cancel).instrument(span).await
    }

    async fn send_inner(
        &self,
        envelope: &MailEnvelope,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mail = envelope::validate(envelope, options, &self.auth.mailbox).await?;

        let draft = self.create_draft(&mail, options, cancel).await?;
        tracing::debug!(draft_id = %draft.id, "draft created");

        let outcome = self.deliver(&draft, &mail, options, cancel).await;

        // The draft must not outlive the send, even when the caller
        // cancelled mid-pipeline, so cleanup runs under its own
        // cancellation scope.
        let cleanup_cancel = CancellationToken::new();
        let cleanup = self.delete_draft(&draft, options, &cleanup_cancel).await;

        match (outcome, cleanup) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(cleanup_err)) => Err(cleanup_err),
            (Err(operation), Ok(())) => Err(operation),
            (Err(operation), Err(cleanup_err)) => Err(Error::Aggregate {
                operation: Box::new(operation),
                cleanup: Box::new(cleanup_err),
            }),
        }
    }

    /// Attach, materialize, send.
    async fn deliver(
        &self,
        draft: &DraftHandle,
        mail: &ValidatedMail,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for attachment in &mail.attachments {
            if attachment.size <= options.large_threshold {
                self.attach_small(draft, attachment, options, cancel).await?;
            } else {
                self.upload_large(draft, attachment, options, cancel).await?;
            }
        }

        let clean = self.materialize(draft, options, cancel).await?;
        self.post_send_mail(&draft.mailbox, clean, options, cancel).await
    }

    async fn create_draft(
        &self,
        mail: &ValidatedMail,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<DraftHandle> {
        let url = self.user_url(&mail.from, &["messages"])?;
        let draft = DraftMessage {
            subject: mail.subject.clone(),
            body: ItemBody::new(mail.body.clone(), mail.body_is_html),
            to_recipients: recipients(&mail.to),
            cc_recipients: recipients(&mail.cc),
            bcc_recipients: recipients(&mail.bcc),
        };
        let body = serde_json::to_value(&draft)?;

        let response = self
            .authed_request(Method::POST, &url, Some(body), options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::CreateMessage(ApiFailure::from_response(response).await));
        }

        let created: DraftCreated = response.json().await?;
        Ok(DraftHandle {
            id: created.id,
            mailbox: mail.from.clone(),
            created_on_server: true,
        })
    }

    async fn attach_small(
        &self,
        draft: &DraftHandle,
        attachment: &crate::envelope::ValidatedAttachment,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let bytes = tokio::fs::read(&attachment.path).await.map_err(|err| Error::Attachment {
            name: attachment.name.clone(),
            offset: 0,
            source: AttachmentFailure::Io(err),
        })?;

        let doc = FileAttachment {
            odata_type: FILE_ATTACHMENT_ODATA_TYPE.to_string(),
            name: attachment.name.clone(),
            content_type: attachment.content_type.clone(),
            content_bytes: STANDARD.encode(&bytes),
            is_inline: attachment.is_inline,
            content_id: attachment.content_id.clone(),
        };
        let body = serde_json::to_value(&doc)?;

        let url = self.user_url(&draft.mailbox, &["messages", &draft.id, "attachments"])?;
        let response = self
            .authed_request(Method::POST, &url, Some(body), options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::Attachment {
                name: attachment.name.clone(),
                offset: 0,
                source: AttachmentFailure::Api(ApiFailure::from_response(response).await),
            });
        }

        tracing::debug!(name = %attachment.name, size = attachment.size, "small attachment posted");
        Ok(())
    }

    async fn materialize(
        &self,
        draft: &DraftHandle,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<crate::wire::CleanMessage> {
        let mut url = self.user_url(&draft.mailbox, &["messages", &draft.id])?;
        url.query_pairs_mut().append_pair("$expand", "attachments");

        let response = self
            .authed_request(Method::GET, &url, None, options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::Materialize(ApiFailure::from_response(response).await));
        }

        response
            .json()
            .await
            .map_err(|err| Error::Materialize(ApiFailure::from_decode(&err)))
    }

    async fn post_send_mail(
        &self,
        mailbox: &str,
        message: crate::wire::CleanMessage,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = self.user_url(mailbox, &["sendMail"])?;
        let body = serde_json::to_value(&SendMailRequest {
            message,
            save_to_sent_items: options.save_to_sent_items,
        })?;

        let response = self
            .authed_request(Method::POST, &url, Some(body), options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::SendMessage(ApiFailure::from_response(response).await));
        }
        Ok(())
    }

    async fn delete_draft(
        &self,
        draft: &DraftHandle,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !draft.created_on_server {
            return Ok(());
        }

        let url = self.user_url(&draft.mailbox, &["messages", &draft.id])?;
        let response = self
            .authed_request(Method::DELETE, &url, None, options, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(Error::DeleteDraft(ApiFailure::from_response(response).await));
        }

        tracing::debug!(draft_id = %draft.id, "draft removed");
        Ok(())
    }

    /// Executes one bearer-authenticated request under the retry policy.
    ///
    /// The token is fetched from the cache immediately before every
    /// attempt; a long-running send never reuses a token captured at
    /// its beginning.
    pub(crate) async fn authed_request(
        &self,
        method: Method,
        url: &Url,
        body: Option<serde_json::Value>,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        retry::execute(&self.retry, self.transport.as_ref(), cancel, || {
            let method = method.clone();
            let url = url.clone();
            let body = body.clone();
            async move {
                let bearer = self.tokens.get(cancel).await?;
                let mut builder = self
                    .http
                    .request(method, url)
                    .bearer_auth(bearer)
                    .header(reqwest::header::ACCEPT, "application/json");
                if let Some(body) = &body {
                    builder = builder.json(body);
                }
                if let Some(timeout) = options.request_timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(Error::Http)
            }
        })
        .await
    }

    /// Builds `{base}/users/{mailbox}/{tail...}` with encoded segments.
    pub(crate) fn user_url(&self, mailbox: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::Config("base URL cannot be a base".into()))?;
            segments.pop_if_empty();
            segments.push("users");
            segments.push(mailbox);
            segments.extend(tail);
        }
        Ok(url)
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn buffer_pool(&self) -> &BufferPool {
        &self.buffers
    }

    pub(crate) fn default_mailbox(&self) -> &str {
        &self.auth.mailbox
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }
}

fn recipients(addresses: &[String]) -> Vec<Recipient> {
    addresses.iter().map(Recipient::new).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sender() -> Sender {
        Sender::new(AuthConfig::new("tenant", "client", "secret", "box@x.io")).unwrap()
    }

    #[test]
    fn test_user_url_encodes_mailbox_segment() {
        let url = sender().user_url("user name@x.io", &["messages", "M1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/users/user%20name@x.io/messages/M1"
        );
    }

    #[test]
    fn test_user_url_plain_mailbox() {
        let url = sender().user_url("box@x.io", &["sendMail"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://graph.microsoft.com/v1.0/users/box@x.io/sendMail"
        );
    }

    #[test]
    fn test_empty_tenant_rejected() {
        let err = Sender::new(AuthConfig::new("", "client", "secret", "box@x.io")).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }
}
