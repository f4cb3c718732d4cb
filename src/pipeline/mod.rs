// src/pipeline/mod.rs

//! Scrape job pipeline: orchestration and export.

pub mod export;
pub mod scrape;

pub use export::{export_all, export_stem, ExportPaths};
pub use scrape::{ExportTarget, ScrapeEngine, ScrapeReport};
