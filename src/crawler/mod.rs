//! Crawler module for walking the division code directory
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with fixed-delay retry
//! - Page classification by row markers
//! - Record building and id encoding
//! - Subtree-at-a-time crawl coordination

mod builder;
mod classifier;
mod coordinator;
mod fetcher;
mod releases;

pub use builder::{build_records, PageScope};
pub use classifier::{classify, Cell, PageClass, RawRow};
pub use coordinator::{
    run_crawl, CrawlContext, CrawlPhase, CrawlSettings, CrawlStats, Crawler, YearReport,
};
pub use fetcher::{
    build_http_client, fetch_with_retry, FetchError, FetchResult, Fetched, HttpFetcher,
    PageFetcher,
};
pub use releases::{fetch_release_dates, ReleaseDates};

use crate::config::Config;
use crate::AreaError;
use tokio::sync::watch;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the SQLite database
/// 2. Build the HTTP client
/// 3. Read the release date of every published year
/// 4. Walk each configured year depth-first, one batch per subtree
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `shutdown` - Stops the crawl at the next fetch once `true` is sent
///
/// # Returns
///
/// * `Ok(Vec<YearReport>)` - One report per crawled year
/// * `Err(AreaError)` - Crawl failed; batches committed so far are kept
pub async fn crawl(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<YearReport>, AreaError> {
    run_crawl(config, shutdown).await
}
