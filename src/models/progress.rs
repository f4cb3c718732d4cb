// src/models/progress.rs

//! Durable scrape job state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Company;

/// Mutable, durable state of one scrape job.
///
/// Owned exclusively by one engine run and persisted to the checkpoint
/// store on a fixed cadence and on shutdown. Forward compatible: unknown
/// fields are ignored on load and missing fields default safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeProgress {
    /// Filter signature this progress belongs to
    #[serde(default)]
    pub signature: String,

    /// Current listing page index (1-based)
    #[serde(default = "defaults::page")]
    pub page: usize,

    /// Identifiers already resolved into accumulated records
    #[serde(default)]
    pub resolved: BTreeSet<String>,

    /// Identifiers marked unresolvable (404, parse failure, exhausted
    /// retries); excluded from all future attempts, including resumes
    #[serde(default)]
    pub skipped: BTreeSet<String>,

    /// Accumulated completed records
    #[serde(default)]
    pub companies: Vec<Company>,

    /// Target record count, if the job was given a limit
    #[serde(default)]
    pub limit: Option<usize>,

    /// Total results the directory reported for this filter, once known
    #[serde(default)]
    pub total_results: Option<usize>,

    /// Timestamp of the last checkpoint write
    #[serde(default)]
    pub checkpointed_at: Option<DateTime<Utc>>,

    /// Set once the listing was exhausted or the limit was reached
    #[serde(default)]
    pub finished: bool,
}

impl Default for ScrapeProgress {
    fn default() -> Self {
        Self {
            signature: String::new(),
            page: defaults::page(),
            resolved: BTreeSet::new(),
            skipped: BTreeSet::new(),
            companies: Vec::new(),
            limit: None,
            total_results: None,
            checkpointed_at: None,
            finished: false,
        }
    }
}

impl ScrapeProgress {
    /// Fresh progress for a new job.
    pub fn new(signature: impl Into<String>, limit: Option<usize>) -> Self {
        Self {
            signature: signature.into(),
            limit,
            ..Self::default()
        }
    }

    /// Whether this ref was already handled (resolved or permanently skipped).
    pub fn is_seen(&self, id: &str) -> bool {
        self.resolved.contains(id) || self.skipped.contains(id)
    }

    /// Record one successfully resolved company.
    pub fn record_success(&mut self, id: impl Into<String>, company: Company) {
        self.resolved.insert(id.into());
        self.companies.push(company);
    }

    /// Mark a ref as permanently skipped.
    pub fn record_skip(&mut self, id: impl Into<String>) {
        self.skipped.insert(id.into());
    }

    /// Number of completed records so far.
    pub fn collected(&self) -> usize {
        self.companies.len()
    }

    /// Whether the result limit, if any, has been reached.
    pub fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|n| self.companies.len() >= n)
    }
}

mod defaults {
    pub fn page() -> usize {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_progress_starts_at_page_one() {
        let progress = ScrapeProgress::new("abc", Some(5));
        assert_eq!(progress.page, 1);
        assert_eq!(progress.collected(), 0);
        assert!(!progress.finished);
    }

    #[test]
    fn seen_covers_resolved_and_skipped() {
        let mut progress = ScrapeProgress::new("abc", None);
        progress.record_success("a", Company::default());
        progress.record_skip("b");
        assert!(progress.is_seen("a"));
        assert!(progress.is_seen("b"));
        assert!(!progress.is_seen("c"));
    }

    #[test]
    fn limit_reached_only_with_limit() {
        let mut progress = ScrapeProgress::new("abc", None);
        progress.record_success("a", Company::default());
        assert!(!progress.limit_reached());

        progress.limit = Some(1);
        assert!(progress.limit_reached());
    }

    #[test]
    fn loads_with_missing_and_unknown_fields() {
        // Older checkpoints may lack fields; newer ones may carry extras.
        let json = r#"{"signature":"abc","future_field":42}"#;
        let progress: ScrapeProgress = serde_json::from_str(json).unwrap();
        assert_eq!(progress.signature, "abc");
        assert_eq!(progress.page, 1);
        assert!(progress.resolved.is_empty());
        assert!(progress.skipped.is_empty());
        assert!(progress.companies.is_empty());
    }
}
