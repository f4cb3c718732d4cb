// src/services/mod.rs

//! Fetching and extraction services.

pub mod fetcher;
pub mod http;
pub mod parser;
pub mod rate_limit;
pub mod retry;

pub use fetcher::{FetchResult, Fetcher, Payload};
pub use http::{HttpGet, HttpResponse, ReqwestTransport, TransportError};
pub use rate_limit::RateLimiter;
pub use retry::{Decision, Failure, RetryPolicy};
