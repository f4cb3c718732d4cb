// src/utils/url.rs

//! Listing and detail URL construction.
//!
//! URL grammar of the directory:
//!
//! ```text
//! Activity only:      /Actividad/PESCA/
//! Province only:      /provincia/JAEN/
//! Combined:           /Actividad/PESCA/provincia/PONTEVEDRA/
//! With locality:      /Actividad/PESCA/localidad/VIGO-PONTEVEDRA/
//! Pagination:         .../PgNum-2/   (page 1 carries no suffix)
//! ```

use crate::error::{AppError, Result};
use crate::models::FilterSelection;

/// Build the listing URL for a page of search results.
///
/// Locality takes precedence over province (it is more specific). At
/// least one filter must be set; the directory has no unfiltered listing.
pub fn build_listing_url(base_url: &str, filters: &FilterSelection, page: usize) -> Result<String> {
    if filters.is_empty() {
        return Err(AppError::validation(
            "at least one filter (activity, province or locality) is required",
        ));
    }

    let mut url = base_url.trim_end_matches('/').to_string();

    if let Some(activity) = &filters.activity {
        url.push_str(&format!("/Actividad/{activity}"));
    }
    if let Some(locality) = &filters.locality {
        url.push_str(&format!("/localidad/{locality}"));
    } else if let Some(province) = &filters.province {
        url.push_str(&format!("/provincia/{province}"));
    }
    url.push('/');

    if page > 1 {
        url.push_str(&format!("PgNum-{page}/"));
    }

    Ok(url)
}

/// Build the detail URL for a company slug. Absolute inputs pass through.
pub fn build_company_url(base_url: &str, slug: &str) -> String {
    if slug.starts_with("http") {
        return slug.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        slug.trim_start_matches('/')
    )
}
