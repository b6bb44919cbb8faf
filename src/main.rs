//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the Catalog-Harvest product scraper.

use anyhow::{anyhow, Context};
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::harvest::http_driver;
use catalog_harvest::output::{
    generate_markdown_summary, generate_summary, load_statistics, print_statistics, CsvSink,
    FanoutSink, HarvestSink, SqliteSink,
};
use catalog_harvest::storage::{SqliteStorage, Storage};
use catalog_harvest::task::{load_tasks, TaskLoad};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a resilient product catalog scraper
///
/// Catalog-Harvest visits a list of product pages, follows their variant
/// sub-pages, extracts product fields and writes every page either as a
/// record or as a classified failure after bounded retries.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resilient product catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// CSV/TSV file listing the product pages to harvest
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and input and show what would be harvested
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics of the latest run from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary of the latest run and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, cli.input.as_deref())?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else {
        let input = cli
            .input
            .ok_or_else(|| anyhow!("--input <FILE> is required to run a harvest"))?;
        handle_harvest(config, &config_hash, &input).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn read_tasks(input: &Path) -> anyhow::Result<TaskLoad> {
    let load = load_tasks(input)
        .with_context(|| format!("Failed to load tasks from {}", input.display()))?;
    for rejected in &load.rejected {
        tracing::debug!("Rejected row {}: {}", rejected.row, rejected.reason);
    }
    Ok(load)
}

/// Handles the --dry-run mode: validates config and input
fn handle_dry_run(config: &Config, input: Option<&Path>) -> anyhow::Result<()> {
    println!("=== Catalog-Harvest Dry Run ===\n");

    let harvest = &config.harvest;
    println!("Harvest Configuration:");
    println!("  Max attempts: {}", harvest.max_attempts);
    println!("  Variant attempts: {}", harvest.variant_attempts);
    println!(
        "  Delay: {}-{}ms (retry backoff {}ms)",
        harvest.delay_min_ms, harvest.delay_max_ms, harvest.retry_backoff_ms
    );
    println!("  Page timeout: {}s", harvest.page_timeout_secs);
    println!("  Workers: {}", harvest.worker_count);
    println!("  Max variants per page: {}", harvest.max_variants);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Results: {}", config.output.results_path);
    println!("  Failures: {}", config.output.failures_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\nSelectors:");
    for (field, selector) in config.selectors.entries() {
        println!("  {}: {}", field, selector);
    }

    println!("\n✓ Configuration is valid");

    if let Some(input) = input {
        let load = read_tasks(input)?;
        println!("\nInput: {}", input.display());
        for task in load.tasks.iter().take(10) {
            println!("  - {}", task.address);
        }
        if load.tasks.len() > 10 {
            println!("  ... and {} more", load.tasks.len() - 10);
        }
        println!(
            "\n✓ Would harvest {} product page(s) ({} row(s) rejected)",
            load.tasks.len(),
            load.rejected.len()
        );
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    match load_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No harvest runs recorded yet."),
    }

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Harvest Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    tracing::info!("Loading harvest data from database...");
    let summary = generate_summary(&storage)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: &str, input: &Path) -> anyhow::Result<()> {
    let load = read_tasks(input)?;
    tracing::info!(
        "Loaded {} task(s) from {} ({} row(s) rejected)",
        load.tasks.len(),
        input.display(),
        load.rejected.len()
    );

    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let run_id = storage.create_run(config_hash, load.tasks.len())?;
    let storage = Arc::new(Mutex::new(storage));

    let csv = CsvSink::create(
        Path::new(&config.output.results_path),
        Path::new(&config.output.failures_path),
    )?;
    let sink: Arc<dyn HarvestSink> = Arc::new(
        FanoutSink::new()
            .with(Arc::new(SqliteSink::new(storage.clone(), run_id)))
            .with(Arc::new(csv)),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight tasks");
            let _ = shutdown_tx.send(true);
        }
    });

    let driver = http_driver(&config)?
        .with_sink(sink)
        .with_shutdown(shutdown_rx);
    let report = driver.run(load.tasks).await?;

    tracing::info!(
        "Run {} finished: {} record(s), {} failure(s), {} unprocessed",
        run_id,
        report.results.len(),
        report.failures.len(),
        report.unprocessed.len()
    );

    let summary = {
        let storage = storage
            .lock()
            .map_err(|_| anyhow!("Storage lock poisoned"))?;
        generate_summary(&*storage)?
    };
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;
    tracing::info!("Summary written to {}", config.output.summary_path);

    Ok(())
}
