// src/error.rs

//! Unified error handling for the scraper application.

use std::fmt;

use thiserror::Error;

/// Result type alias for scraper operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTML extraction failed for one target (treated per-target, never fatal)
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    /// All retry attempts exhausted for one target
    #[error("Fetch failed for {url} after {attempts} attempts: {message}")]
    FetchFailed {
        url: String,
        attempts: usize,
        message: String,
    },

    /// Remote service blocked us (401/403 or CAPTCHA page) past max retries
    #[error("Access blocked by remote service: {0}")]
    Blocked(String),

    /// Checkpoint read/write failed (fatal: progress durability is at risk)
    #[error("Checkpoint error at {path}: {message}")]
    Checkpoint { path: String, message: String },

    /// Export write failed (accumulated records stay in memory)
    #[error("Export error at {path}: {message}")]
    Export { path: String, message: String },

    /// Another job instance holds the checkpoint lock
    #[error("Job already running for this filter signature (lock: {path}, pid {pid})")]
    JobLocked { path: String, pid: u32 },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a parse error for a specific target URL.
    pub fn parse(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a checkpoint error with path context.
    pub fn checkpoint(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Checkpoint {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an export error with path context.
    pub fn export(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Export {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}
