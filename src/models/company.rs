// src/models/company.rs

//! Company record structures.

use serde::{Deserialize, Serialize};

/// Lightweight pointer to one company's detail page.
///
/// Produced by listing parsing, consumed exactly once by detail fetching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyRef {
    /// Stable identifier derived from the detail URL slug
    pub id: String,

    /// Full URL of the detail page
    pub url: String,
}

/// A completed company entry extracted from a detail page.
///
/// All fields are plain strings as they appear on the site; empty string
/// means the field was absent or a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Registered legal name (mandatory)
    #[serde(default)]
    pub legal_name: String,

    /// Tax identifier, CIF (mandatory)
    #[serde(default)]
    pub tax_id: String,

    /// Legal form (S.L., S.A., ...)
    #[serde(default)]
    pub legal_form: String,

    /// Business sector
    #[serde(default)]
    pub sector: String,

    /// Declared activity
    #[serde(default)]
    pub activity: String,

    /// CNAE activity code
    #[serde(default)]
    pub cnae: String,

    /// Corporate purpose / object
    #[serde(default)]
    pub corporate_purpose: String,

    /// Registration status
    #[serde(default)]
    pub status: String,

    /// Founding date as shown on the site
    #[serde(default)]
    pub founded: String,

    /// Postal address
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub website: String,

    /// Sales figure with reporting year
    #[serde(default)]
    pub sales: String,

    /// Employee count with reporting year
    #[serde(default)]
    pub employees: String,

    /// Shareholding information
    #[serde(default)]
    pub shareholdings: String,

    /// International operations flag text
    #[serde(default)]
    pub international_ops: String,

    /// Sector group
    #[serde(default)]
    pub sector_group: String,

    /// Stock exchange listing flag text
    #[serde(default)]
    pub publicly_listed: String,

    /// URL of the detail page this record was extracted from
    #[serde(default)]
    pub source_url: String,
}

impl Company {
    /// A record is complete only when every mandatory field is non-empty.
    ///
    /// Incomplete records are retried by the engine, never emitted.
    pub fn is_complete(&self) -> bool {
        !self.legal_name.trim().is_empty() && !self.tax_id.trim().is_empty()
    }
}
