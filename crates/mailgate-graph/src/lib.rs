//! # mailgate-graph
//!
//! Outbound mail gateway for Microsoft Graph v1.0 with an app-only
//! (client-credentials) identity.
//!
//! The heart of the crate is the send pipeline for messages with
//! arbitrarily large attachments: a draft is created in the sender's
//! mailbox, small attachments are posted inline as base64, large ones
//! stream through resumable upload sessions in `Content-Range` chunks,
//! the draft is read back and whitelisted into a send payload, the
//! message is sent, and the draft is removed in every outcome,
//! including errors and cancellation.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailgate_graph::{AuthConfig, CancellationToken, EmailAttachment, MailEnvelope, SendOptions, Sender};
//!
//! #[tokio::main]
//! async fn main() -> mailgate_graph::Result<()> {
//!     let sender = Sender::new(AuthConfig::from_env()?)?;
//!
//!     let envelope = MailEnvelope::new(["team@example.com"])
//!         .subject("Quarterly report")
//!         .html_body("<p>Attached.</p>")
//!         .attachment(EmailAttachment::new("report.pdf", "/tmp/report.pdf"));
//!
//!     sender
//!         .send(&envelope, &SendOptions::default(), &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: sender identity and per-send options
//! - [`envelope`]: the outbound message model and its validation
//! - [`retry`]: the bounded retry executor with decorrelated jitter
//! - [`transport`]: the pluggable HTTP transport seam
//! - [`wire`]: typed Graph v1.0 wire documents

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod envelope;
mod error;
mod receive;
pub mod retry;
mod sender;
pub mod transport;
mod upload;
pub mod wire;

pub use config::{AuthConfig, SendOptions};
pub use envelope::{EmailAttachment, MailEnvelope};
pub use error::{ApiFailure, AttachmentFailure, Error, Result};
pub use sender::{Sender, GRAPH_BASE_URL};
pub use transport::{HttpTransport, ReqwestTransport};
pub use wire::{AttachmentDto, MessageDto};

// The cancellation handle threaded through every public operation.
pub use tokio_util::sync::CancellationToken;
