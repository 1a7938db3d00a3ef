//! # mailgate-oauth
//!
//! Application-only `OAuth2` token provider for the Microsoft identity
//! platform (client-credentials grant).
//!
//! The crate acquires app-only bearer tokens from the tenant token
//! endpoint and keeps a single cached token per [`TokenCache`], refreshed
//! lazily with at most one refresh in flight at a time.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailgate_oauth::{ClientCredentialsFlow, Provider, TokenCache};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mailgate_oauth::Result<()> {
//!     let provider = Provider::microsoft("my-tenant-id")?;
//!     let flow = ClientCredentialsFlow::new("client-id", "client-secret", provider);
//!     let cache = TokenCache::new(flow);
//!
//!     let bearer = cache.get(&CancellationToken::new()).await?;
//!     println!("Bearer {bearer}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cache;
mod error;
mod flow;
mod provider;
mod token;

pub use cache::TokenCache;
pub use error::{Error, Result};
pub use flow::ClientCredentialsFlow;
pub use provider::Provider;
pub use token::{Token, TokenResponse};
