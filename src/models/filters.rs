// src/models/filters.rs

//! Filter selection identifying one scrape job.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The (activity, province, locality, limit) tuple identifying a job.
///
/// The signature derived from it keys the checkpoint file, so a resumed
/// run only ever matches an identical prior request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    /// Activity slug, uppercase (e.g. "PESCA")
    pub activity: Option<String>,

    /// Province slug, uppercase (e.g. "PONTEVEDRA")
    pub province: Option<String>,

    /// Locality slug including province (e.g. "VIGO-PONTEVEDRA")
    pub locality: Option<String>,

    /// Maximum number of records to collect (None = all)
    pub limit: Option<usize>,
}

impl FilterSelection {
    /// True when no filter at all is set. The directory requires at least one.
    pub fn is_empty(&self) -> bool {
        self.activity.is_none() && self.province.is_none() && self.locality.is_none()
    }

    /// Stable hex key for this selection, used to name the checkpoint file.
    pub fn signature(&self) -> String {
        let canonical = format!(
            "activity={}|province={}|locality={}|limit={}",
            self.activity.as_deref().unwrap_or(""),
            self.province.as_deref().unwrap_or(""),
            self.locality.as_deref().unwrap_or(""),
            self.limit.map_or(String::new(), |n| n.to_string()),
        );
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Lowercased slug fragments in URL order, for export file naming.
    pub fn slug_fragments(&self) -> Vec<String> {
        [&self.activity, &self.province, &self.locality]
            .into_iter()
            .flatten()
            .map(|s| s.to_lowercase())
            .collect()
    }

    /// Human-readable one-line description for logs.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(a) = &self.activity {
            parts.push(format!("activity={a}"));
        }
        if let Some(p) = &self.province {
            parts.push(format!("province={p}"));
        }
        if let Some(l) = &self.locality {
            parts.push(format!("locality={l}"));
        }
        match self.limit {
            Some(n) => parts.push(format!("limit={n}")),
            None => parts.push("limit=all".to_string()),
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pesca_vigo() -> FilterSelection {
        FilterSelection {
            activity: Some("PESCA".to_string()),
            province: None,
            locality: Some("VIGO-PONTEVEDRA".to_string()),
            limit: Some(50),
        }
    }

    #[test]
    fn signature_is_stable() {
        assert_eq!(pesca_vigo().signature(), pesca_vigo().signature());
    }

    #[test]
    fn signature_distinguishes_limit() {
        let mut other = pesca_vigo();
        other.limit = Some(100);
        assert_ne!(pesca_vigo().signature(), other.signature());
    }

    #[test]
    fn signature_distinguishes_filters() {
        let mut other = pesca_vigo();
        other.activity = Some("BANCA".to_string());
        assert_ne!(pesca_vigo().signature(), other.signature());
    }

    #[test]
    fn empty_detection() {
        assert!(FilterSelection::default().is_empty());
        assert!(!pesca_vigo().is_empty());
    }

    #[test]
    fn slug_fragments_lowercased_in_order() {
        assert_eq!(pesca_vigo().slug_fragments(), vec!["pesca", "vigo-pontevedra"]);
    }
}
