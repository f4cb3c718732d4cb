// src/services/retry.rs

//! Retry policy: failure classification and exponential backoff.

use std::time::Duration;

/// Classification of one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Connection timeout, reset, or HTTP 5xx
    Transient(String),

    /// HTTP 429; carries the Retry-After header when present
    RateLimited { retry_after: Option<u64> },

    /// HTTP 401/403 or an anti-bot page served with status 200
    Blocked(String),

    /// HTTP 404: the target does not exist, never retried
    NotFound,

    /// Parsed record missing mandatory fields; the page may render
    /// differently on a later attempt
    Incomplete,
}

impl Failure {
    /// Classify an HTTP status code; `None` means the status is a success.
    pub fn from_status(status: u16, retry_after: Option<u64>) -> Option<Failure> {
        match status {
            200..=299 => None,
            404 => Some(Failure::NotFound),
            429 => Some(Failure::RateLimited { retry_after }),
            401 | 403 => Some(Failure::Blocked(format!("HTTP {status}"))),
            500..=599 => Some(Failure::Transient(format!("HTTP {status}"))),
            _ => Some(Failure::Transient(format!("unexpected HTTP {status}"))),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Transient(msg) => write!(f, "transient failure: {msg}"),
            Failure::RateLimited { retry_after: Some(secs) } => {
                write!(f, "rate limited (retry after {secs}s)")
            }
            Failure::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Failure::Blocked(msg) => write!(f, "blocked: {msg}"),
            Failure::NotFound => write!(f, "not found"),
            Failure::Incomplete => write!(f, "record incomplete"),
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Wait the given duration and try again
    Retry(Duration),

    /// Give up on this target
    Abandon,
}

/// Exponential backoff policy.
///
/// Wait for attempt `n` (0-based) is `base * 2^n` seconds; a 429 response
/// substitutes its Retry-After value for the base. A target is abandoned
/// after `max_retries` consecutive retryable failures. Not-found is
/// terminal immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    backoff_base_secs: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, backoff_base_secs: u64) -> Self {
        Self {
            max_retries,
            backoff_base_secs,
        }
    }

    /// Decide the next step after the failure of attempt `attempt` (0-based).
    pub fn decide(&self, attempt: usize, failure: &Failure) -> Decision {
        if matches!(failure, Failure::NotFound) {
            return Decision::Abandon;
        }
        if attempt + 1 >= self.max_retries {
            return Decision::Abandon;
        }

        let base = match failure {
            Failure::RateLimited {
                retry_after: Some(secs),
            } => *secs,
            _ => self.backoff_base_secs,
        };
        let wait = base.saturating_mul(1u64 << attempt.min(32));
        Decision::Retry(Duration::from_secs(wait))
    }
}
