// src/services/fetcher.rs

//! Rate-limited, retrying page fetcher.

use std::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::ScraperConfig;
use crate::services::http::HttpGet;
use crate::services::rate_limit::RateLimiter;
use crate::services::retry::{Decision, Failure, RetryPolicy};

/// Phrases that identify an anti-bot interstitial served with status 200.
const BLOCK_INDICATORS: [&str; 4] = [
    "demasiadas peticiones detectadas",
    "verificar que no es un robot",
    "resuelva el captcha",
    "too many requests detected",
];

/// Terminal payload of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Html(String),
    /// HTTP 404: the page or record does not exist
    NotFound,
}

/// Outcome of a fetch, with the number of retries it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub payload: Payload,
    pub retries: usize,
}

/// Performs one logical GET through the rate limiter and retry policy.
///
/// Strictly sequential by design: the caller never has more than one
/// fetch in flight, which is what keeps the job under the directory's
/// abuse threshold.
pub struct Fetcher<T: HttpGet> {
    transport: T,
    rate_limiter: RateLimiter,
    policy: RetryPolicy,
    max_retries: usize,
    user_agent: Mutex<String>,
    fallback_user_agent: String,
}

impl<T: HttpGet> Fetcher<T> {
    pub fn new(transport: T, config: &ScraperConfig) -> Self {
        Self {
            transport,
            rate_limiter: RateLimiter::new(config),
            policy: RetryPolicy::new(config.max_retries, config.retry_backoff_base_secs),
            max_retries: config.max_retries,
            user_agent: Mutex::new(config.user_agent.clone()),
            fallback_user_agent: config.fallback_user_agent.clone(),
        }
    }

    /// Fetch one page, retrying per policy.
    ///
    /// Returns the body on success, `Payload::NotFound` on a terminal 404,
    /// `AppError::Blocked` when the remote keeps refusing us, and
    /// `AppError::FetchFailed` when retryable failures exhaust the budget.
    pub async fn fetch(&self, url: &str) -> Result<FetchResult> {
        let mut attempt = 0;
        loop {
            self.rate_limiter.wait().await;

            let agent = self.current_agent();
            let failure = match self.transport.get(url, &agent).await {
                Ok(response) => {
                    match Failure::from_status(response.status, response.retry_after) {
                        None => {
                            if detect_block(&response.body) {
                                Failure::Blocked("anti-bot page in 200 response".to_string())
                            } else {
                                return Ok(FetchResult {
                                    payload: Payload::Html(response.body),
                                    retries: attempt,
                                });
                            }
                        }
                        Some(failure) => failure,
                    }
                }
                Err(e) => Failure::Transient(e.to_string()),
            };

            match self.policy.decide(attempt, &failure) {
                Decision::Retry(wait) => {
                    if matches!(failure, Failure::Blocked(_)) {
                        self.switch_agent();
                    }
                    log::warn!(
                        "Attempt {}/{} failed for {url}: {failure}. Retrying in {}s",
                        attempt + 1,
                        self.max_retries,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Decision::Abandon => {
                    return match failure {
                        Failure::NotFound => Ok(FetchResult {
                            payload: Payload::NotFound,
                            retries: attempt,
                        }),
                        Failure::Blocked(msg) => Err(AppError::Blocked(format!("{msg} at {url}"))),
                        other => Err(AppError::FetchFailed {
                            url: url.to_string(),
                            attempts: attempt + 1,
                            message: other.to_string(),
                        }),
                    };
                }
            }
        }
    }

    fn current_agent(&self) -> String {
        self.user_agent.lock().expect("user agent lock").clone()
    }

    /// Swap to the alternative declared agent after a detected block.
    fn switch_agent(&self) {
        let mut agent = self.user_agent.lock().expect("user agent lock");
        if *agent != self.fallback_user_agent {
            log::warn!("Block detected, switching to fallback User-Agent");
            *agent = self.fallback_user_agent.clone();
        }
    }
}

fn detect_block(body: &str) -> bool {
    let lower = body.to_lowercase();
    BLOCK_INDICATORS.iter().any(|needle| lower.contains(needle))
}
