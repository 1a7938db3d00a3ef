//! Resumable chunked uploads for large attachments.
//!
//! Drives the backend's upload-session protocol: a `createUploadSession`
//! POST yields a pre-authenticated URL, the file is PUT in sequential
//! `Content-Range` chunks, and a 404 mid-upload marks the session as
//! lost: the engine then starts a fresh session from offset zero, up
//! to three sessions in total. Chunk buffers come from a shared pool
//! and are returned on every exit path.

use crate::config::SendOptions;
use crate::envelope::ValidatedAttachment;
use crate::error::{ApiFailure, AttachmentFailure, Error, Result};
use crate::retry;
use crate::sender::{DraftHandle, Sender};
use crate::wire::{AttachmentItem, CreateUploadSession, UploadChunkAck, UploadSessionCreated};
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};
use tokio::io::AsyncReadExt as _;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Upload sessions attempted per attachment before giving up.
const MAX_SESSION_ATTEMPTS: u32 = 3;

/// How one upload session ended short of completion.
enum ChunkFailure {
    /// The backend invalidated the session (404 on a chunk PUT).
    SessionLost(ApiFailure),
    /// Anything else; not recoverable by a new session.
    Fatal(Error),
}

impl Sender {
    /// Uploads one large attachment through an upload session.
    ///
    /// On success the attachment is fully committed on the backend.
    pub(crate) async fn upload_large(
        &self,
        draft: &DraftHandle,
        attachment: &ValidatedAttachment,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let delays = retry::jitter_delays(MAX_SESSION_ATTEMPTS as usize - 1);
        let mut last_loss = None;

        for session in 1..=MAX_SESSION_ATTEMPTS {
            let upload_url = self
                .create_upload_session(draft, attachment, options, cancel)
                .await?;

            match self
                .run_chunk_loop(&upload_url, attachment, options, cancel)
                .await
            {
                Ok(()) => {
                    tracing::debug!(
                        name = %attachment.name,
                        size = attachment.size,
                        session,
                        "large attachment committed"
                    );
                    return Ok(());
                }
                Err(ChunkFailure::SessionLost(failure)) => {
                    tracing::warn!(
                        name = %attachment.name,
                        session,
                        draft_id = %draft.id,
                        "upload session lost, recreating"
                    );
                    last_loss = Some(failure);
                    if let Some(delay) = delays.get(session as usize - 1) {
                        retry::sleep_cancellable(*delay, cancel).await?;
                    }
                }
                Err(ChunkFailure::Fatal(err)) => return Err(err),
            }
        }

        let last = last_loss.unwrap_or_else(|| ApiFailure {
            status: None,
            code: None,
            message: "upload session lost".to_string(),
        });
        Err(Error::Attachment {
            name: attachment.name.clone(),
            offset: 0,
            source: AttachmentFailure::SessionExhausted {
                sessions: MAX_SESSION_ATTEMPTS,
                draft_id: draft.id.clone(),
                last,
            },
        })
    }

    /// POSTs `createUploadSession` and returns the pre-authenticated URL.
    async fn create_upload_session(
        &self,
        draft: &DraftHandle,
        attachment: &ValidatedAttachment,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.user_url(
            &draft.mailbox,
            &["messages", &draft.id, "attachments", "createUploadSession"],
        )?;
        let body = serde_json::to_value(&CreateUploadSession {
            attachment_item: AttachmentItem {
                attachment_type: "file".to_string(),
                name: attachment.name.clone(),
                size: attachment.size,
                is_inline: attachment.is_inline,
                content_id: attachment.content_id.clone(),
            },
        })?;

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

        let session: UploadSessionCreated = response.json().await.map_err(|err| Error::Attachment {
            name: attachment.name.clone(),
            offset: 0,
            source: AttachmentFailure::Api(ApiFailure::from_decode(&err)),
        })?;
        Ok(session.upload_url)
    }

    /// Streams the file to the session URL from offset zero.
    async fn run_chunk_loop(
        &self,
        upload_url: &str,
        attachment: &ValidatedAttachment,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), ChunkFailure> {
        let total = attachment.size;
        let attachment_err = |offset: u64, source: AttachmentFailure| {
            ChunkFailure::Fatal(Error::Attachment {
                name: attachment.name.clone(),
                offset,
                source,
            })
        };

        let mut file = tokio::fs::File::open(&attachment.path)
            .await
            .map_err(|err| attachment_err(0, AttachmentFailure::Io(err)))?;
        let mut buffer = self.buffer_pool().rent(options.chunk_size);
        let mut offset: u64 = 0;

        while offset < total {
            if cancel.is_cancelled() {
                return Err(ChunkFailure::Fatal(Error::Cancelled));
            }

            let want = usize::try_from(total - offset)
                .map_or(options.chunk_size, |remaining| {
                    remaining.min(options.chunk_size)
                });
            let read = fill_buffer(&mut file, &mut buffer[..want])
                .await
                .map_err(|err| attachment_err(offset, AttachmentFailure::Io(err)))?;
            if read < want {
                return Err(attachment_err(
                    offset + read as u64,
                    AttachmentFailure::Truncated { expected: total },
                ));
            }

            let chunk = Bytes::copy_from_slice(&buffer[..want]);
            let end = offset + want as u64 - 1;
            let response = self
                .put_chunk(upload_url, chunk, offset, end, total, &attachment.content_type, options, cancel)
                .await
                .map_err(ChunkFailure::Fatal)?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(ChunkFailure::SessionLost(
                    ApiFailure::from_response(response).await,
                ));
            }
            if !status.is_success() {
                return Err(attachment_err(
                    offset,
                    AttachmentFailure::Api(ApiFailure::from_response(response).await),
                ));
            }

            offset += want as u64;
            if status == StatusCode::OK || status == StatusCode::CREATED {
                break;
            }

            // 202: the body reports the ranges still expected.
            let ack: UploadChunkAck = response.json().await.unwrap_or_default();
            if ack.next_expected_ranges.is_empty() {
                break;
            }
            tracing::trace!(offset, total, name = %attachment.name, "chunk committed");
        }

        if offset != total {
            return Err(attachment_err(
                offset,
                AttachmentFailure::Incomplete {
                    committed: offset,
                    expected: total,
                },
            ));
        }
        Ok(())
    }

    /// PUTs one chunk to the pre-authenticated session URL.
    ///
    /// No Authorization header: the session URL carries its own
    /// authentication.
    #[allow(clippy::too_many_arguments)]
    async fn put_chunk(
        &self,
        upload_url: &str,
        chunk: Bytes,
        offset: u64,
        end: u64,
        total: u64,
        content_type: &str,
        options: &SendOptions,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let url = Url::parse(upload_url)
            .map_err(|err| Error::Config(format!("invalid upload URL: {err}")))?;
        let content_range = format!("bytes {offset}-{end}/{total}");

        retry::execute(self.retry_policy(), self.transport(), cancel, || {
            let url = url.clone();
            let chunk = chunk.clone();
            let content_range = content_range.clone();
            let content_type = content_type.to_string();
            async move {
                let mut builder = self
                    .http_client()
                    .put(url)
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .header(reqwest::header::CONTENT_LENGTH, chunk.len() as u64)
                    .header(reqwest::header::CONTENT_RANGE, content_range)
                    .body(chunk);
                if let Some(timeout) = options.request_timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(Error::Http)
            }
        })
        .await
    }
}

/// Reads until the slice is full or the file ends.
async fn fill_buffer(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = file.read(&mut buf[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    Ok(filled)
}

/// Shared pool of chunk buffers.
///
/// Buffers are rented per upload and handed back when the guard drops,
/// so error and cancellation paths return them like the success path.
#[derive(Debug, Default)]
pub(crate) struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rents a buffer of exactly `size` bytes.
    pub(crate) fn rent(&self, size: usize) -> PooledBuffer<'_> {
        let mut buffer = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        buffer.resize(size, 0);
        PooledBuffer { pool: self, buffer }
    }

    fn give_back(&self, buffer: Vec<u8>) {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(buffer);
    }
}

/// RAII guard over a rented buffer.
pub(crate) struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buffer: Vec<u8>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buffer));
    }
}
