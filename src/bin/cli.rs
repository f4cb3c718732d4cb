// src/bin/cli.rs

//! Leadscraper CLI
//!
//! Local execution entry point for the Empresite directory scraper.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use leadscraper::{
    error::{AppError, Result},
    models::{Config, FilterSelection},
    pipeline::{export_stem, ExportTarget, ScrapeEngine},
    services::ReqwestTransport,
    storage::CheckpointStore,
};

/// Leadscraper - Empresite company directory scraper
#[derive(Parser, Debug)]
#[command(
    name = "leadscraper",
    version,
    about = "Scrape company records from the Empresite directory"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory for checkpoints and job locks
    #[arg(long, default_value = "state")]
    state_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Activity filter, display name or slug (e.g. "Pesca" or "PESCA")
    #[arg(short, long)]
    activity: Option<String>,

    /// Province filter, display name or slug (e.g. "Pontevedra")
    #[arg(short, long)]
    province: Option<String>,

    /// Locality slug including its province (e.g. "VIGO-PONTEVEDRA")
    #[arg(short = 'l', long)]
    locality: Option<String>,

    /// Stop after collecting this many records
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape companies matching a filter selection
    Scrape {
        #[command(flatten)]
        filters: FilterArgs,

        /// Directory for the exported JSON and CSV files
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// List the known activity and province filters
    Filters,

    /// Show checkpoint status for a filter selection
    Info {
        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve CLI filter arguments against the configured slug tables.
///
/// Activity and province accept either the display name or the URL slug;
/// unknown values pass through uppercased so filters outside the shipped
/// tables remain usable.
fn resolve_filters(config: &Config, args: &FilterArgs) -> Result<FilterSelection> {
    let resolve = |input: &Option<String>, table: &dyn Fn(&str) -> Option<String>, kind: &str| {
        input.as_deref().map(|raw| {
            table(raw).unwrap_or_else(|| {
                log::warn!("Unknown {kind} '{raw}', using it as a literal slug");
                raw.trim().to_uppercase()
            })
        })
    };

    let selection = FilterSelection {
        activity: resolve(&args.activity, &|s| config.filters.resolve_activity(s), "activity"),
        province: resolve(&args.province, &|s| config.filters.resolve_province(s), "province"),
        locality: args.locality.as_deref().map(|s| s.trim().to_uppercase()),
        limit: args.limit,
    };

    if selection.is_empty() {
        return Err(AppError::validation(
            "at least one of --activity, --province or --locality is required",
        ));
    }
    Ok(selection)
}

/// Flip the stop flag on the first Ctrl-C so the engine can checkpoint
/// and exit after the in-flight target.
fn install_stop_handler(stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Stop requested; finishing the current target and checkpointing");
            stop.store(true, Ordering::Relaxed);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::Scrape {
            filters,
            output_dir,
        } => {
            let selection = resolve_filters(&config, &filters)?;
            log::info!("Scraping {}", selection.describe());

            let stop = Arc::new(AtomicBool::new(false));
            install_stop_handler(Arc::clone(&stop));

            let transport = ReqwestTransport::new(&config.scraper)?;
            let store = CheckpointStore::new(&cli.state_dir);
            let target = ExportTarget {
                dir: output_dir,
                stem: export_stem(&selection, chrono::Local::now()),
            };

            let engine = ScrapeEngine::new(Arc::new(config), transport, store, stop);
            match engine.run(&selection, &target).await {
                Ok(report) => {
                    log::info!(
                        "Finished: {} records, {} skipped, {} listing pages, {} checkpoints",
                        report.collected,
                        report.skipped,
                        report.pages_processed,
                        report.checkpoint_counts.len()
                    );
                    if let Some(paths) = &report.export {
                        log::info!("Artifacts: {} / {}", paths.json.display(), paths.csv.display());
                    } else if report.stopped_early {
                        log::info!(
                            "Stopped early; resume with the same filters (checkpoint: {})",
                            report.checkpoint_path.display()
                        );
                    }
                }
                Err(e) => {
                    log::error!("Scrape failed: {e}");
                    log::error!("Re-run with the same filters to resume from the checkpoint");
                    return Err(e);
                }
            }
        }

        Command::Filters => {
            println!("Activities ({}):", config.filters.activities.len());
            for entry in &config.filters.activities {
                println!("  {:<24} {}", entry.slug, entry.name);
            }
            println!();
            println!("Provinces ({}):", config.filters.provinces.len());
            for entry in &config.filters.provinces {
                println!("  {:<24} {}", entry.slug, entry.name);
            }
        }

        Command::Info { filters } => {
            let selection = resolve_filters(&config, &filters)?;
            let store = CheckpointStore::new(&cli.state_dir);
            let signature = selection.signature();

            println!("Filters:    {}", selection.describe());
            println!("Signature:  {signature}");
            println!("Checkpoint: {}", store.checkpoint_path(&signature).display());

            match store.load(&signature).await? {
                Some(progress) => {
                    println!("Records:    {}", progress.collected());
                    println!("Skipped:    {}", progress.skipped.len());
                    println!("Next page:  {}", progress.page);
                    println!("Finished:   {}", progress.finished);
                    if let Some(at) = progress.checkpointed_at {
                        println!("Saved at:   {at}");
                    }
                }
                None => println!("No checkpoint found for this selection."),
            }
        }

        Command::Validate => {
            log::info!("Configuration at {} is valid", cli.config.display());
            log::info!(
                "{} activities, {} provinces in the filter tables",
                config.filters.activities.len(),
                config.filters.provinces.len()
            );
        }
    }

    Ok(())
}
