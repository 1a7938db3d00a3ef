//! Retry executor for backend calls.
//!
//! Wraps one logical request in a bounded retry loop: 5 attempts
//! total, decorrelated-jitter delays pre-generated at construction,
//! and a server-supplied `Retry-After` delta overriding the scheduled
//! delay for the next attempt. The factory builds a fresh request per
//! attempt because request bodies are consumed on send and the bearer
//! token must be re-fetched.

use crate::error::{truncate_body, Error, Result};
use crate::transport::HttpTransport;
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempts per request (initial + retries).
pub const MAX_ATTEMPTS: u32 = 5;

/// Lower bound of the first jittered delay.
const BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Upper bound on any single delay.
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// A pre-generated decorrelated-jitter delay schedule.
///
/// Each delay is drawn uniformly between the base and three times the
/// previous delay (capped), so concurrent senders never retry in
/// lockstep. The median first-retry delay is one second.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Generates a fresh schedule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delays: jitter_delays(MAX_ATTEMPTS as usize - 1),
        }
    }

    /// The scheduled delay before the retry with the given 1-indexed
    /// attempt number.
    fn delay_before_attempt(&self, next_attempt: u32) -> Duration {
        let index = (next_attempt.saturating_sub(2)) as usize;
        self.delays
            .get(index)
            .copied()
            .unwrap_or(BACKOFF_CAP)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws `count` decorrelated-jitter delays.
pub(crate) fn jitter_delays(count: usize) -> Vec<Duration> {
    let base = BACKOFF_BASE.as_millis() as u64;
    let cap = BACKOFF_CAP.as_millis() as u64;
    let mut rng = rand::thread_rng();
    let mut prev = base;
    let mut delays = Vec::with_capacity(count);
    for _ in 0..count {
        let upper = prev.saturating_mul(3).clamp(base, cap);
        prev = rng.gen_range(base..=upper);
        delays.push(Duration::from_millis(prev));
    }
    delays
}

/// Executes one logical request with the retry policy.
///
/// Retriable outcomes are 408, 429, any 5xx, and connect/reset/timeout
/// class transport errors not caused by the caller's cancel signal.
/// The final response is returned even when its status is a failure;
/// callers map it to their own error kind. Cancellation is honored
/// before every attempt and during every sleep.
///
/// # Errors
///
/// Returns an error if the factory fails (e.g. token acquisition), the
/// transport fails with a non-retriable or retry-exhausted error, or
/// the caller cancels.
pub async fn execute<F, Fut>(
    policy: &RetryPolicy,
    transport: &dyn HttpTransport,
    cancel: &CancellationToken,
    mut build: F,
) -> Result<reqwest::Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Request>>,
{
    for attempt in 1..=MAX_ATTEMPTS {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let request = build().await?;
        match transport.send(request).await {
            Ok(response) => {
                let status = response.status();
                if !is_retriable_status(status) || attempt == MAX_ATTEMPTS {
                    return Ok(response);
                }

                let delay = retry_after(&response)
                    .unwrap_or_else(|| policy.delay_before_attempt(attempt + 1));
                let body = truncate_body(&response.text().await.unwrap_or_default());
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    status = status.as_u16(),
                    body,
                    "retrying after retriable status"
                );
                sleep_cancellable(delay, cancel).await?;
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                if !is_retriable_error(&err) || attempt == MAX_ATTEMPTS {
                    return Err(Error::Http(err));
                }

                let delay = policy.delay_before_attempt(attempt + 1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transport error"
                );
                sleep_cancellable(delay, cancel).await?;
            }
        }
    }

    unreachable!("the final attempt returns from inside the loop")
}

/// 408, 429, and any 5xx invite a retry.
fn is_retriable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Connection, reset, and deadline failures invite a retry; request
/// construction errors do not.
fn is_retriable_error(err: &reqwest::Error) -> bool {
    !err.is_builder() && (err.is_connect() || err.is_timeout() || err.is_request())
}

/// Parses a `Retry-After` delta (seconds) when present.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Sleeps for `delay` unless the caller cancels first.
pub(crate) async fn sleep_cancellable(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    tokio::select! {
        () = cancel.cancelled() => Err(Error::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
