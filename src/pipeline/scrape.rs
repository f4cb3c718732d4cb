// src/pipeline/scrape.rs

//! Scrape orchestration engine.
//!
//! Drives pagination across listing pages, resolves each company ref into
//! a full record, checkpoints progress on a fixed cadence and hands the
//! final record set to the exporter. Modeled as an explicit state machine
//! so resume-after-crash is a first-class transition:
//!
//! ```text
//! Init → Listing → Detail → Checkpoint → (Listing | Done) → Export → Terminal
//! ```
//!
//! Per-target failures (404, parse error, exhausted retries) are contained
//! as permanent skips; only storage-layer failures abort the job, and even
//! those get a best-effort final checkpoint first.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Company, CompanyRef, Config, FilterSelection, ScrapeProgress};
use crate::pipeline::export::{export_all, ExportPaths};
use crate::services::fetcher::{Fetcher, Payload};
use crate::services::http::HttpGet;
use crate::services::parser::{parse_company_page, parse_listing_page, parse_result_count};
use crate::services::retry::{Decision, Failure, RetryPolicy};
use crate::storage::CheckpointStore;
use crate::utils::build_listing_url;

/// Where the final artifacts go.
#[derive(Debug, Clone)]
pub struct ExportTarget {
    pub dir: PathBuf,
    pub stem: String,
}

/// Summary of one engine run.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    pub signature: String,
    /// Listing pages fetched during this run
    pub pages_processed: usize,
    /// Total records accumulated (including resumed ones)
    pub collected: usize,
    /// Total refs permanently skipped
    pub skipped: usize,
    /// Resolved-record count at each checkpoint write, in order
    pub checkpoint_counts: Vec<usize>,
    /// Retries that detail targets needed this run (zero-retry refs omitted)
    pub detail_retries: HashMap<String, usize>,
    /// True when the run ended on an external stop signal
    pub stopped_early: bool,
    pub export: Option<ExportPaths>,
    /// Checkpoint location, reported so a failed job can be resumed
    pub checkpoint_path: PathBuf,
}

enum EngineState {
    Init,
    Listing,
    Detail(VecDeque<CompanyRef>),
    Checkpoint { resume: Box<EngineState> },
    Done,
    Export,
    Terminal,
}

enum RefOutcome {
    Resolved { company: Company, retries: usize },
    Skipped(String),
}

/// The scrape orchestrator. Owns one job's progress for the whole run;
/// strictly one outstanding HTTP request at a time.
pub struct ScrapeEngine<T: HttpGet> {
    config: Arc<Config>,
    fetcher: Fetcher<T>,
    policy: RetryPolicy,
    store: CheckpointStore,
    stop: Arc<AtomicBool>,
}

impl<T: HttpGet> ScrapeEngine<T> {
    pub fn new(
        config: Arc<Config>,
        transport: T,
        store: CheckpointStore,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let fetcher = Fetcher::new(transport, &config.scraper);
        let policy = RetryPolicy::new(
            config.scraper.max_retries,
            config.scraper.retry_backoff_base_secs,
        );
        Self {
            config,
            fetcher,
            policy,
            store,
            stop,
        }
    }

    /// Run one job to completion (or stop/fatal error).
    ///
    /// Holds the signature lock for the duration; a second instance
    /// against the same filters refuses to start.
    pub async fn run(&self, filters: &FilterSelection, export: &ExportTarget) -> Result<ScrapeReport> {
        let signature = filters.signature();
        let lock = self.store.acquire_lock(&signature).await?;
        let result = self.run_locked(filters, &signature, export).await;
        if let Err(e) = lock.release().await {
            log::warn!("Failed to release job lock: {e}");
        }
        result
    }

    async fn run_locked(
        &self,
        filters: &FilterSelection,
        signature: &str,
        export: &ExportTarget,
    ) -> Result<ScrapeReport> {
        let mut progress = match self.store.load(signature).await? {
            Some(prior) => {
                log::info!(
                    "Resuming checkpoint for {} ({} records, {} skipped, page {})",
                    filters.describe(),
                    prior.collected(),
                    prior.skipped.len(),
                    prior.page
                );
                prior
            }
            None => {
                log::info!("Starting fresh job for {}", filters.describe());
                ScrapeProgress::new(signature, filters.limit)
            }
        };

        let mut report = ScrapeReport {
            signature: signature.to_string(),
            pages_processed: 0,
            collected: 0,
            skipped: 0,
            checkpoint_counts: Vec::new(),
            detail_retries: HashMap::new(),
            stopped_early: false,
            export: None,
            checkpoint_path: self.store.checkpoint_path(signature),
        };

        let outcome = self
            .drive(filters, &mut progress, &mut report, export)
            .await;

        report.collected = progress.collected();
        report.skipped = progress.skipped.len();

        match outcome {
            Ok(()) => Ok(report),
            Err(e) => {
                // Best-effort final checkpoint so already-scraped data survives.
                if let Err(save_err) = self.store.save(&mut progress).await {
                    log::error!("Final checkpoint failed: {save_err}");
                } else {
                    log::error!(
                        "Job failed; progress saved at {}",
                        report.checkpoint_path.display()
                    );
                }
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        filters: &FilterSelection,
        progress: &mut ScrapeProgress,
        report: &mut ScrapeReport,
        export: &ExportTarget,
    ) -> Result<()> {
        let mut state = EngineState::Init;
        loop {
            state = match state {
                EngineState::Init => {
                    if progress.finished {
                        log::info!("Job already finished; re-exporting accumulated records");
                        EngineState::Done
                    } else {
                        EngineState::Listing
                    }
                }
                EngineState::Listing => self.listing_step(filters, progress, report).await?,
                EngineState::Detail(batch) => self.detail_step(batch, progress, report).await?,
                EngineState::Checkpoint { resume } => {
                    self.write_checkpoint(progress, report).await?;
                    *resume
                }
                EngineState::Done => {
                    if !report.stopped_early {
                        progress.finished = true;
                    }
                    self.write_checkpoint(progress, report).await?;
                    if report.stopped_early {
                        log::info!(
                            "Stopped on request; {} records checkpointed for resume",
                            progress.collected()
                        );
                        EngineState::Terminal
                    } else {
                        EngineState::Export
                    }
                }
                EngineState::Export => {
                    let paths = export_all(&progress.companies, &export.dir, &export.stem)?;
                    log::info!(
                        "Exported {} records to {} and {}",
                        progress.collected(),
                        paths.json.display(),
                        paths.csv.display()
                    );
                    report.export = Some(paths);
                    EngineState::Terminal
                }
                EngineState::Terminal => return Ok(()),
            };
        }
    }

    /// Fetch and parse the current listing page.
    ///
    /// `progress.page` stays on the page whose refs are being processed;
    /// it only advances once the page's whole batch is handled. A
    /// checkpoint taken mid-batch therefore re-lists the same page on
    /// resume, and the seen-filter drops everything already done.
    async fn listing_step(
        &self,
        filters: &FilterSelection,
        progress: &mut ScrapeProgress,
        report: &mut ScrapeReport,
    ) -> Result<EngineState> {
        if self.stop.load(Ordering::Relaxed) {
            report.stopped_early = true;
            return Ok(EngineState::Done);
        }
        if progress.limit_reached() {
            return Ok(EngineState::Done);
        }
        if let Some(last) = self.last_page(progress) {
            if progress.page > last {
                log::info!("All {last} listing pages walked; done");
                return Ok(EngineState::Done);
            }
        }

        let base = &self.config.scraper.base_url;
        let url = build_listing_url(base, filters, progress.page)?;
        log::info!("Fetching listing page {}: {url}", progress.page);

        let html = match self.fetcher.fetch(&url).await {
            Ok(fetched) => match fetched.payload {
                Payload::Html(html) => html,
                Payload::NotFound => {
                    log::info!("Listing page {} not found; pagination ends", progress.page);
                    return Ok(EngineState::Done);
                }
            },
            Err(AppError::Blocked(msg)) if self.config.scraper.auth_block_fatal => {
                return Err(AppError::Blocked(msg));
            }
            Err(e @ (AppError::Blocked(_) | AppError::FetchFailed { .. })) => {
                log::error!("Skipping listing page {}: {e}", progress.page);
                progress.page += 1;
                return Ok(EngineState::Listing);
            }
            Err(e) => return Err(e),
        };

        report.pages_processed += 1;
        if progress.total_results.is_none() {
            let total = parse_result_count(&html);
            if total > 0 {
                log::info!("Directory reports {total} companies for this filter");
                progress.total_results = Some(total);
            }
        }

        let refs = match parse_listing_page(&html, base) {
            Ok(refs) => refs,
            Err(e) => {
                log::error!("Skipping unparsable listing page {}: {e}", progress.page);
                progress.page += 1;
                return Ok(EngineState::Listing);
            }
        };

        if refs.is_empty() {
            log::info!("Listing page {} carries no results; done", progress.page);
            return Ok(EngineState::Done);
        }

        let pending: VecDeque<CompanyRef> = refs
            .into_iter()
            .filter(|r| !progress.is_seen(&r.id))
            .collect();
        log::info!(
            "Page {}: {} pending refs ({} already handled)",
            progress.page,
            pending.len(),
            progress.resolved.len() + progress.skipped.len()
        );

        if pending.is_empty() {
            progress.page += 1;
            Ok(EngineState::Listing)
        } else {
            Ok(EngineState::Detail(pending))
        }
    }

    /// Last listing page worth fetching, once the directory has reported
    /// a result total. The directory may clamp an out-of-range `PgNum` to
    /// the final page instead of returning 404, so the walk needs its own
    /// upper bound.
    fn last_page(&self, progress: &ScrapeProgress) -> Option<usize> {
        let total = progress.total_results?;
        let wanted = progress.limit.map_or(total, |n| total.min(n));
        Some(wanted.div_ceil(self.config.scraper.results_per_page).max(1))
    }

    /// Resolve the next ref of the batch into a record.
    async fn detail_step(
        &self,
        mut batch: VecDeque<CompanyRef>,
        progress: &mut ScrapeProgress,
        report: &mut ScrapeReport,
    ) -> Result<EngineState> {
        if self.stop.load(Ordering::Relaxed) {
            report.stopped_early = true;
            return Ok(EngineState::Done);
        }
        // Remaining pending refs are discarded once the limit is hit.
        if progress.limit_reached() {
            return Ok(EngineState::Done);
        }

        let Some(company_ref) = batch.pop_front() else {
            // Every ref of the page is handled; only now move past it.
            progress.page += 1;
            return Ok(EngineState::Listing);
        };

        match self.resolve_ref(&company_ref).await? {
            RefOutcome::Resolved { company, retries } => {
                progress.record_success(&company_ref.id, company);
                if retries > 0 {
                    report.detail_retries.insert(company_ref.id.clone(), retries);
                }
                log::info!(
                    "[{}] collected ({} total)",
                    company_ref.id,
                    progress.collected()
                );

                if progress.limit_reached() {
                    log::info!("Result limit reached");
                    return Ok(EngineState::Done);
                }
                if progress.collected() % self.config.scraper.save_every_n == 0 {
                    return Ok(EngineState::Checkpoint {
                        resume: Box::new(EngineState::Detail(batch)),
                    });
                }
                Ok(EngineState::Detail(batch))
            }
            RefOutcome::Skipped(reason) => {
                progress.record_skip(&company_ref.id);
                log::warn!("[{}] permanently skipped: {reason}", company_ref.id);
                Ok(EngineState::Detail(batch))
            }
        }
    }

    /// Fetch and parse one detail page, retrying incomplete records.
    async fn resolve_ref(&self, company_ref: &CompanyRef) -> Result<RefOutcome> {
        let mut incomplete_attempts = 0;
        let mut retries = 0;
        loop {
            let fetched = match self.fetcher.fetch(&company_ref.url).await {
                Ok(fetched) => fetched,
                Err(AppError::Blocked(msg)) if self.config.scraper.auth_block_fatal => {
                    return Err(AppError::Blocked(msg));
                }
                Err(AppError::Blocked(msg)) => {
                    return Ok(RefOutcome::Skipped(format!("blocked: {msg}")));
                }
                Err(AppError::FetchFailed {
                    attempts, message, ..
                }) => {
                    return Ok(RefOutcome::Skipped(format!(
                        "fetch failed after {attempts} attempts: {message}"
                    )));
                }
                Err(e) => return Err(e),
            };
            retries += fetched.retries;

            let html = match fetched.payload {
                Payload::Html(html) => html,
                Payload::NotFound => return Ok(RefOutcome::Skipped("not found (404)".to_string())),
            };

            let company = match parse_company_page(&html, &company_ref.url) {
                Ok(company) => company,
                // Parse failures count as not-found for this target.
                Err(e) => return Ok(RefOutcome::Skipped(format!("parse error: {e}"))),
            };

            if company.is_complete() {
                return Ok(RefOutcome::Resolved { company, retries });
            }

            match self.policy.decide(incomplete_attempts, &Failure::Incomplete) {
                Decision::Retry(wait) => {
                    log::warn!(
                        "[{}] record incomplete; re-fetching in {}s",
                        company_ref.id,
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                    incomplete_attempts += 1;
                    retries += 1;
                }
                Decision::Abandon => {
                    return Ok(RefOutcome::Skipped(
                        "incomplete record (mandatory fields missing)".to_string(),
                    ));
                }
            }
        }
    }

    async fn write_checkpoint(
        &self,
        progress: &mut ScrapeProgress,
        report: &mut ScrapeReport,
    ) -> Result<()> {
        self.store.save(progress).await?;
        report.checkpoint_counts.push(progress.collected());
        log::info!(
            "Checkpoint written: {} records, {} skipped, next page {}",
            progress.collected(),
            progress.skipped.len(),
            progress.page
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::models::ScraperConfig;
    use crate::services::http::{HttpResponse, TransportError};

    type Scripted = std::result::Result<HttpResponse, TransportError>;

    /// Transport replaying scripted responses; panics on any URL it was
    /// never scripted for, which doubles as a no-unexpected-fetch assert.
    struct ScriptedTransport {
        responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    }

    impl ScriptedTransport {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
            }
        }

        fn script(&self, url: &str, sequence: Vec<Scripted>) {
            self.responses
                .lock()
                .unwrap()
                .insert(url.to_string(), sequence.into());
        }
    }

    #[async_trait]
    impl HttpGet for &ScriptedTransport {
        async fn get(&self, url: &str, _user_agent: &str) -> Scripted {
            self.responses
                .lock()
                .unwrap()
                .get_mut(url)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| panic!("unexpected fetch of {url}"))
        }
    }

    fn ok(body: String) -> Scripted {
        Ok(HttpResponse {
            status: 200,
            body,
            retry_after: None,
        })
    }

    fn status(code: u16) -> Scripted {
        Ok(HttpResponse {
            status: code,
            body: String::new(),
            retry_after: None,
        })
    }

    const BASE: &str = "https://empresite.eleconomista.es";

    fn test_config() -> Config {
        Config {
            scraper: ScraperConfig {
                delay_min_secs: 0.0,
                delay_max_secs: 0.0,
                retry_backoff_base_secs: 0,
                ..ScraperConfig::default()
            },
            ..Config::default()
        }
    }

    fn pesca_filters(limit: Option<usize>) -> FilterSelection {
        FilterSelection {
            activity: Some("PESCA".to_string()),
            province: None,
            locality: None,
            limit,
        }
    }

    fn listing_url(page: usize) -> String {
        if page == 1 {
            format!("{BASE}/Actividad/PESCA/")
        } else {
            format!("{BASE}/Actividad/PESCA/PgNum-{page}/")
        }
    }

    fn detail_url(id: &str) -> String {
        format!("{BASE}/{id}.html")
    }

    fn company_cards(ids: &[String]) -> String {
        ids.iter()
            .map(|id| {
                format!(
                    r#"<div class="cardCompanyBox"><meta itemprop="url" content="/{id}.html"></div>"#
                )
            })
            .collect()
    }

    fn listing_html(ids: &[String]) -> String {
        format!("<html><body>{}</body></html>", company_cards(ids))
    }

    fn listing_html_with_total(ids: &[String], total: usize) -> String {
        format!(
            r#"<html><body><div id="filter-numresultados">Hemos encontrado {total} empresas</div>{}</body></html>"#,
            company_cards(ids)
        )
    }

    fn detail_html(name: &str, cif: &str) -> String {
        format!(
            "<html><head><title>{name} - Empresite</title></head><body>\
             <div><h3>Razón social</h3><p>{name}</p></div>\
             <div><h3>CIF</h3><p>{cif}</p></div>\
             </body></html>"
        )
    }

    fn ids(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("EMP-{i}")).collect()
    }

    /// Script a full happy-path job: one listing page, all details ok.
    fn script_basic_job(transport: &ScriptedTransport, ids: &[String]) {
        transport.script(&listing_url(1), vec![ok(listing_html(ids))]);
        transport.script(&listing_url(2), vec![status(404)]);
        for id in ids {
            transport.script(&detail_url(id), vec![ok(detail_html(id, "B12345678"))]);
        }
    }

    struct Harness {
        _state: TempDir,
        out: TempDir,
        store: CheckpointStore,
        config: Arc<Config>,
        stop: Arc<AtomicBool>,
    }

    impl Harness {
        fn new(config: Config) -> Self {
            let state = TempDir::new().unwrap();
            let store = CheckpointStore::new(state.path());
            Self {
                _state: state,
                out: TempDir::new().unwrap(),
                store,
                config: Arc::new(config),
                stop: Arc::new(AtomicBool::new(false)),
            }
        }

        fn engine<'a>(&self, transport: &'a ScriptedTransport) -> ScrapeEngine<&'a ScriptedTransport> {
            ScrapeEngine::new(
                Arc::clone(&self.config),
                transport,
                self.store.clone(),
                Arc::clone(&self.stop),
            )
        }

        fn target(&self) -> ExportTarget {
            ExportTarget {
                dir: self.out.path().to_path_buf(),
                stem: "test_run".to_string(),
            }
        }
    }

    #[tokio::test]
    async fn transient_detail_failures_are_retried() {
        let harness = Harness::new(test_config());
        let transport = ScriptedTransport::new();
        let all = ids(12);
        script_basic_job(&transport, &all);
        // Ref #5 fails transiently twice before succeeding.
        transport.script(
            &detail_url("EMP-5"),
            vec![
                Err(TransportError::Timeout),
                status(503),
                ok(detail_html("EMP-5", "B5")),
            ],
        );

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 12);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.detail_retries.get("EMP-5"), Some(&2));
        assert_eq!(report.detail_retries.len(), 1);

        let paths = report.export.unwrap();
        let exported: Vec<Company> =
            serde_json::from_slice(&std::fs::read(&paths.json).unwrap()).unwrap();
        assert_eq!(exported.len(), 12);
        assert!(exported.iter().any(|c| c.legal_name == "EMP-5"));
    }

    #[tokio::test]
    async fn not_found_detail_is_permanently_skipped() {
        let harness = Harness::new(test_config());
        let transport = ScriptedTransport::new();
        let all = ids(12);
        script_basic_job(&transport, &all);
        transport.script(&detail_url("EMP-3"), vec![status(404)]);

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 11);
        assert_eq!(report.skipped, 1);

        let progress = harness
            .store
            .load(&report.signature)
            .await
            .unwrap()
            .unwrap();
        assert!(progress.skipped.contains("EMP-3"));
        assert!(!progress.resolved.contains("EMP-3"));
    }

    #[tokio::test]
    async fn checkpoint_cadence_and_final_write() {
        let harness = Harness::new(test_config()); // save_every_n = 10
        let transport = ScriptedTransport::new();
        let all = ids(25);
        script_basic_job(&transport, &all);

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 25);
        // Two intermediate checkpoints plus the final one, counts increasing.
        assert_eq!(report.checkpoint_counts, vec![10, 20, 25]);
    }

    #[tokio::test]
    async fn result_limit_stops_exactly_at_n() {
        let harness = Harness::new(test_config());
        let transport = ScriptedTransport::new();
        let all = ids(12);
        // Only the first 5 details are scripted; fetching a 6th would panic.
        transport.script(&listing_url(1), vec![ok(listing_html(&all))]);
        for id in &all[..5] {
            transport.script(&detail_url(id), vec![ok(detail_html(id, "B1"))]);
        }

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(Some(5)), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 5);
        let exported: Vec<Company> =
            serde_json::from_slice(&std::fs::read(&report.export.unwrap().json).unwrap()).unwrap();
        assert_eq!(exported.len(), 5);
    }

    #[tokio::test]
    async fn resume_never_refetches_seen_refs() {
        let harness = Harness::new(test_config());
        let filters = pesca_filters(None);
        let signature = filters.signature();

        // Prior run resolved EMP-1 and permanently skipped EMP-2.
        let mut prior = ScrapeProgress::new(&signature, None);
        prior.record_success(
            "EMP-1",
            Company {
                legal_name: "EMP-1".to_string(),
                tax_id: "B1".to_string(),
                ..Company::default()
            },
        );
        prior.record_skip("EMP-2");
        harness.store.save(&mut prior).await.unwrap();

        let transport = ScriptedTransport::new();
        transport.script(&listing_url(1), vec![ok(listing_html(&ids(3)))]);
        transport.script(&listing_url(2), vec![status(404)]);
        // Only EMP-3 may be fetched; EMP-1/EMP-2 would panic the transport.
        transport.script(&detail_url("EMP-3"), vec![ok(detail_html("EMP-3", "B3"))]);

        let engine = harness.engine(&transport);
        let report = engine.run(&filters, &harness.target()).await.unwrap();

        assert_eq!(report.collected, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn resume_after_mid_batch_failure_completes_the_page() {
        let harness = Harness::new(test_config()); // save_every_n = 10
        let filters = pesca_filters(None);
        let all = ids(25);

        // First run: ten successes, a cadence checkpoint, then a fatal
        // block on the eleventh ref of the same listing page.
        let transport = ScriptedTransport::new();
        transport.script(&listing_url(1), vec![ok(listing_html(&all))]);
        for id in &all[..10] {
            transport.script(&detail_url(id), vec![ok(detail_html(id, "B1"))]);
        }
        transport.script(
            &detail_url("EMP-11"),
            vec![status(403), status(403), status(403), status(403)],
        );
        let engine = harness.engine(&transport);
        let err = engine.run(&filters, &harness.target()).await.unwrap_err();
        assert!(matches!(err, AppError::Blocked(_)));

        // The interrupted page is still the current one in the checkpoint.
        let saved = harness
            .store
            .load(&filters.signature())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.collected(), 10);
        assert_eq!(saved.page, 1);

        // Second run: the page is listed again, the already-handled refs
        // are filtered out (fetching one of them would panic the
        // transport), and the rest of the page is collected.
        let transport = ScriptedTransport::new();
        transport.script(&listing_url(1), vec![ok(listing_html(&all))]);
        transport.script(&listing_url(2), vec![status(404)]);
        for id in &all[10..] {
            transport.script(&detail_url(id), vec![ok(detail_html(id, "B1"))]);
        }
        let engine = harness.engine(&transport);
        let report = engine.run(&filters, &harness.target()).await.unwrap();

        assert_eq!(report.collected, 25);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn page_walk_is_capped_by_the_reported_total() {
        let harness = Harness::new(test_config()); // results_per_page = 30
        let transport = ScriptedTransport::new();
        let all = ids(2);
        // A directory that clamps out-of-range PgNum to the last page
        // never 404s; the reported total must end the walk. Page 2 is
        // deliberately unscripted, so fetching it panics the transport.
        transport.script(&listing_url(1), vec![ok(listing_html_with_total(&all, 2))]);
        for id in &all {
            transport.script(&detail_url(id), vec![ok(detail_html(id, "B1"))]);
        }

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 2);
        assert_eq!(report.pages_processed, 1);
    }

    #[tokio::test]
    async fn incomplete_record_is_retried_then_skipped() {
        let harness = Harness::new(test_config());
        let transport = ScriptedTransport::new();
        let all = ids(1);
        transport.script(&listing_url(1), vec![ok(listing_html(&all))]);
        transport.script(&listing_url(2), vec![status(404)]);
        // Body parses but never yields the mandatory fields.
        let empty = "<html><head><title></title></head><body></body></html>".to_string();
        transport.script(
            &detail_url("EMP-1"),
            vec![
                ok(empty.clone()),
                ok(empty.clone()),
                ok(empty.clone()),
                ok(empty),
            ],
        );

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn persistent_block_is_fatal_by_default_with_checkpoint() {
        let harness = Harness::new(test_config());
        let transport = ScriptedTransport::new();
        let all = ids(2);
        transport.script(&listing_url(1), vec![ok(listing_html(&all))]);
        transport.script(&detail_url("EMP-1"), vec![ok(detail_html("EMP-1", "B1"))]);
        transport.script(
            &detail_url("EMP-2"),
            vec![status(403), status(403), status(403), status(403)],
        );

        let filters = pesca_filters(None);
        let engine = harness.engine(&transport);
        let err = engine.run(&filters, &harness.target()).await.unwrap_err();
        assert!(matches!(err, AppError::Blocked(_)));

        // The best-effort checkpoint preserved EMP-1.
        let progress = harness
            .store
            .load(&filters.signature())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(progress.collected(), 1);
        assert!(!progress.finished);
    }

    #[tokio::test]
    async fn persistent_block_skips_target_when_configured_local() {
        let mut config = test_config();
        config.scraper.auth_block_fatal = false;
        let harness = Harness::new(config);

        let transport = ScriptedTransport::new();
        let all = ids(2);
        transport.script(&listing_url(1), vec![ok(listing_html(&all))]);
        transport.script(&listing_url(2), vec![status(404)]);
        transport.script(&detail_url("EMP-1"), vec![ok(detail_html("EMP-1", "B1"))]);
        transport.script(
            &detail_url("EMP-2"),
            vec![status(403), status(403), status(403), status(403)],
        );

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.collected, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn stop_signal_checkpoints_without_export() {
        let harness = Harness::new(test_config());
        harness.stop.store(true, Ordering::Relaxed);

        let transport = ScriptedTransport::new();
        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert!(report.stopped_early);
        assert!(report.export.is_none());

        // The job is resumable: the checkpoint is not marked finished.
        let progress = harness
            .store
            .load(&report.signature)
            .await
            .unwrap()
            .unwrap();
        assert!(!progress.finished);
    }

    #[tokio::test]
    async fn listing_pagination_spans_pages_in_order() {
        let harness = Harness::new(test_config());
        let transport = ScriptedTransport::new();
        let page1: Vec<String> = (1..=2).map(|i| format!("EMP-{i}")).collect();
        let page2: Vec<String> = (3..=4).map(|i| format!("EMP-{i}")).collect();
        transport.script(&listing_url(1), vec![ok(listing_html(&page1))]);
        transport.script(&listing_url(2), vec![ok(listing_html(&page2))]);
        transport.script(&listing_url(3), vec![status(404)]);
        for id in page1.iter().chain(&page2) {
            transport.script(&detail_url(id), vec![ok(detail_html(id, "B1"))]);
        }

        let engine = harness.engine(&transport);
        let report = engine
            .run(&pesca_filters(None), &harness.target())
            .await
            .unwrap();

        assert_eq!(report.pages_processed, 2);
        assert_eq!(report.collected, 4);

        // Records accumulate in page/parse order.
        let exported: Vec<Company> =
            serde_json::from_slice(&std::fs::read(&report.export.unwrap().json).unwrap()).unwrap();
        let names: Vec<_> = exported.iter().map(|c| c.legal_name.as_str()).collect();
        assert_eq!(names, vec!["EMP-1", "EMP-2", "EMP-3", "EMP-4"]);
    }
}
