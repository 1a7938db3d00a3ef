//! Cached token provider with single-flight refresh.

use crate::error::{Error, Result};
use crate::flow::ClientCredentialsFlow;
use crate::token::Token;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Token cache for one sender identity.
///
/// Holds at most one token and allows at most one refresh in flight.
/// A usable cached token is returned without blocking; stale callers
/// serialize on the refresh lock and re-check the cache before hitting
/// the token endpoint, so a burst of concurrent callers produces a
/// single token request. A failed refresh leaves the cache unchanged.
#[derive(Debug)]
pub struct TokenCache {
    flow: ClientCredentialsFlow,
    cached: RwLock<Option<Token>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    /// Creates an empty cache backed by the given flow.
    #[must_use]
    pub fn new(flow: ClientCredentialsFlow) -> Self {
        Self {
            flow,
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Returns a bearer token that is usable for at least 30 more seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or the caller cancels while
    /// waiting.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Some(bearer) = self.cached_bearer().await {
            return Ok(bearer);
        }

        let _refresh = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.refresh.lock() => guard,
        };

        // Another caller may have refreshed while we waited for the lock.
        if let Some(bearer) = self.cached_bearer().await {
            return Ok(bearer);
        }

        let token = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            result = self.flow.request_token() => result?,
        };

        let bearer = token.access_token.clone();
        *self.cached.write().await = Some(token);
        Ok(bearer)
    }

    async fn cached_bearer(&self) -> Option<String> {
        let guard = self.cached.read().await;
        guard
            .as_ref()
            .filter(|token| token.is_usable())
            .map(|token| token.access_token.clone())
    }
}
