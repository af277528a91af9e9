//! Area-Info main entry point
//!
//! This is the command-line interface for the Area-Info division crawler.

use anyhow::Context;
use area_info::config::{load_config_with_hash, validate_years, year_index_url, Config};
use area_info::crawler::crawl;
use area_info::output::{load_statistics, print_reports, print_statistics};
use area_info::storage::open_storage;
use area_info::AreaError;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Area-Info: administrative division crawler
///
/// Area-Info walks the published division code directory year by year,
/// from provinces down to villages, and stores every division with a
/// position-derived id in SQLite.
#[derive(Parser, Debug)]
#[command(name = "area-info")]
#[command(version)]
#[command(about = "Administrative division crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl only this year instead of the configured ones (repeatable)
    #[arg(long = "year", value_name = "YEAR")]
    years: Vec<u16>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if !cli.years.is_empty() {
        validate_years(&cli.years).context("Invalid --year")?;
        tracing::info!("Crawling years {:?} from the command line", cli.years);
        config.source.years = cli.years;
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("area_info=info,warn"),
            1 => EnvFilter::new("area_info=debug,info"),
            2 => EnvFilter::new("area_info=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Area-Info Dry Run ===\n");

    println!("Source:");
    println!("  Index: {}", config.source.index_url);
    println!("  Encoding: {}", config.source.encoding);
    println!("  Years ({}):", config.source.years.len());
    for &year in &config.source.years {
        println!("    * {} → {}", year, year_index_url(&config.source.index_url, year)?);
    }

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Retry delay: {}ms", config.http.retry_delay_ms);
    println!("  User agent: {}", config.http.user_agent);

    println!("\nCrawler:");
    println!("  Flush scope: {:?}", config.crawler.flush_scope);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} year(s) from {} into {}",
        config.source.years.len(),
        config.source.index_url,
        config.output.database_path
    );

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next page");
            let _ = stop.send(true);
        }
    });

    match crawl(&config, shutdown).await {
        Ok(reports) => {
            tracing::info!("Crawl completed successfully");
            print_reports(&reports);
            Ok(())
        }
        Err(AreaError::Cancelled { discarded }) => {
            tracing::warn!(
                "Crawl interrupted; {} unflushed records were dropped, committed batches are kept",
                discarded
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
