// src/utils/mod.rs

//! Utility functions and helpers.

pub mod url;

pub use url::{build_company_url, build_listing_url};

/// Stable record identifier from a detail-page URL.
///
/// Detail URLs end in `/<SLUG>.html`; the slug is the identifier.
pub fn company_id_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
        .trim_end_matches(".html")
        .to_string()
}
