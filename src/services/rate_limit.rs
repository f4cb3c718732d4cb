// src/services/rate_limit.rs

//! Randomized inter-request delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;

use crate::models::ScraperConfig;

/// Enforces a delay drawn uniformly from `[delay_min, delay_max]` before
/// every outbound request, retries included.
///
/// The very first request of a session goes out immediately; every
/// subsequent call blocks. The randomization keeps the request cadence
/// under the directory's abuse-detection threshold.
pub struct RateLimiter {
    min_secs: f64,
    max_secs: f64,
    primed: AtomicBool,
}

impl RateLimiter {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            min_secs: config.delay_min_secs,
            max_secs: config.delay_max_secs,
            primed: AtomicBool::new(false),
        }
    }

    /// Sleep for a random duration within the configured bounds.
    pub async fn wait(&self) {
        if !self.primed.swap(true, Ordering::Relaxed) {
            return;
        }
        if self.max_secs <= 0.0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(self.min_secs..=self.max_secs);
        log::debug!("Waiting {:.1}s before next request", secs);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(min: f64, max: f64) -> RateLimiter {
        let config = ScraperConfig {
            delay_min_secs: min,
            delay_max_secs: max,
            ..ScraperConfig::default()
        };
        RateLimiter::new(&config)
    }

    #[tokio::test]
    async fn first_wait_is_immediate() {
        let limiter = limiter(60.0, 60.0);
        let start = std::time::Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_bounds_never_sleep() {
        let limiter = limiter(0.0, 0.0);
        let start = std::time::Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn subsequent_waits_stay_within_bounds() {
        let limiter = limiter(0.5, 1.0);
        limiter.wait().await; // primes the limiter

        let start = tokio::time::Instant::now();
        limiter.wait().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs_f64(0.5));
        assert!(elapsed <= Duration::from_secs_f64(1.05));
    }
}
