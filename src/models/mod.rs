// src/models/mod.rs

//! Data structures for scrape jobs.

pub mod company;
pub mod config;
pub mod filters;
pub mod progress;

pub use company::{Company, CompanyRef};
pub use config::{Config, FilterTables, ScraperConfig};
pub use filters::FilterSelection;
pub use progress::ScrapeProgress;
