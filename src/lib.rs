// src/lib.rs

//! Leadscraper Library
//!
//! Scrape engine for the Empresite company directory: paginated listing
//! traversal, rate-limited detail fetching with retries, durable
//! checkpointing and JSON/CSV export.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
