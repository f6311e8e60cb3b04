//! Retry policy for throttled and transient Graph failures.

use std::error::Error as _;
use std::time::Duration;

use reqwest::StatusCode;

/// Marker Graph puts in workbook responses that ran past the server's time budget.
pub const MAX_REQUEST_DURATION_EXCEEDED: &str = "MaxRequestDurationExceeded";

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// A server-provided `Retry-After` wins over the computed backoff; both
    /// are capped at `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<u64>) -> Duration {
        let delay = match retry_after {
            Some(secs) => Duration::from_secs(secs),
            None => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1).min(16));
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }
}

/// Whether a response with this status and body should be retried.
pub fn is_retryable_response(status: StatusCode, body: &str) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    ) || body.contains(MAX_REQUEST_DURATION_EXCEEDED)
}

/// Whether a transport-level failure should be retried.
///
/// Covers timeouts, failed connects, and connections dropped or reset after
/// the request went out (reported as request or body errors, or with an I/O
/// error somewhere in the source chain).
pub fn is_retryable_transport(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        return true;
    }

    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// HTTP-date values are ignored; Graph sends seconds.
pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
