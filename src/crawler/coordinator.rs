//! Crawler coordinator - main crawl orchestration logic
//!
//! This module walks one publication year at a time:
//! - Fetches the year index and builds the province records
//! - Walks each subtree depth-first (fetch → classify → build → descend)
//! - Flushes the subtree's records to storage as one batch
//! - Stops at the next fetch boundary when shutdown is signalled

use crate::area::{AreaId, AreaRecord, ChildPage, ParentNode};
use crate::config::{year_index_url, Config, FlushScope};
use crate::crawler::builder::{build_records, PageScope};
use crate::crawler::classifier::{classify, PageClass};
use crate::crawler::fetcher::{
    build_http_client, fetch_with_retry, FetchResult, HttpFetcher, PageFetcher,
};
use crate::crawler::releases::{fetch_release_dates, ReleaseDates};
use crate::storage::{SqliteStorage, Storage};
use crate::{AreaError, Result};
use chrono::NaiveDate;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use url::Url;

/// Crawl parameters that do not change between years
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Root listing page; per-year index pages sit next to it
    pub index_url: String,

    /// Fixed delay between retries of a transient fetch failure
    pub retry_delay: Duration,

    pub flush_scope: FlushScope,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_url: config.source.index_url.clone(),
            retry_delay: Duration::from_millis(config.http.retry_delay_ms),
            flush_scope: config.crawler.flush_scope,
        }
    }
}

/// Where the crawl of a year currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    FetchingPage,
    Classifying,
    BuildingRecords,
    RecursingChildren,
    FlushingBatch,
    Done,
}

/// Counters for one year
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Pages fetched with HTTP 200
    pub pages_fetched: u64,

    /// Pages that answered 404
    pub pages_missing: u64,

    /// Placeholder pages with nothing to record
    pub no_data_pages: u64,

    /// Transient failures that were retried
    pub retries: u64,

    /// Records handed to storage
    pub records_written: u64,

    /// Batches committed
    pub batches_flushed: u64,
}

/// Outcome of one crawled year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearReport {
    pub year: u16,
    pub release_date: NaiveDate,
    pub stats: CrawlStats,
}

/// Mutable state of one year's crawl, passed down the walk
pub struct CrawlContext {
    pub year: u16,
    pub release_date: NaiveDate,
    pub stats: CrawlStats,
    /// Records of the subtree being walked, not yet flushed
    buffer: Vec<AreaRecord>,
    phase: CrawlPhase,
    shutdown: watch::Receiver<bool>,
}

impl CrawlContext {
    fn new(year: u16, release_date: NaiveDate, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            year,
            release_date,
            stats: CrawlStats::default(),
            buffer: Vec::new(),
            phase: CrawlPhase::Idle,
            shutdown,
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    /// Records buffered since the last flush
    pub fn buffered(&self) -> &[AreaRecord] {
        &self.buffer
    }

    fn enter(&mut self, phase: CrawlPhase) {
        tracing::trace!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

/// Main crawler structure
///
/// Generic over the page source and the storage backend so the walk can
/// be driven by a mock server or an in-process fetcher in tests.
pub struct Crawler<F, S> {
    fetcher: F,
    storage: S,
    settings: CrawlSettings,
    shutdown: watch::Receiver<bool>,
}

impl<F, S> Crawler<F, S>
where
    F: PageFetcher,
    S: Storage,
{
    /// Creates a crawler that runs until every requested year is done
    pub fn new(fetcher: F, storage: S, settings: CrawlSettings) -> Self {
        let (_, shutdown) = watch::channel(false);
        Self {
            fetcher,
            storage,
            settings,
            shutdown,
        }
    }

    /// Stops the crawl at the next fetch once `true` is sent on `shutdown`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Crawls every year in `years` that has a release date
    ///
    /// Years missing from `releases` are logged and skipped.
    pub async fn run(&mut self, years: &[u16], releases: &ReleaseDates) -> Result<Vec<YearReport>> {
        let mut reports = Vec::with_capacity(years.len());

        for &year in years {
            let Some(release_date) = releases.release_date_for(year) else {
                tracing::warn!("No {} release found, skipping", year);
                continue;
            };

            tracing::info!("Crawling {} (released {})", year, release_date);
            let start = Instant::now();
            let stats = self.crawl_year(year, release_date).await?;
            tracing::info!(
                "Year {} done in {:.2}s: {} records in {} batches, {} pages, {} missing, {} placeholders, {} retries",
                year,
                start.elapsed().as_secs_f64(),
                stats.records_written,
                stats.batches_flushed,
                stats.pages_fetched,
                stats.pages_missing,
                stats.no_data_pages,
                stats.retries
            );

            reports.push(YearReport {
                year,
                release_date,
                stats,
            });
        }

        Ok(reports)
    }

    /// Crawls the full tree of one year
    pub async fn crawl_year(&mut self, year: u16, release_date: NaiveDate) -> Result<CrawlStats> {
        let index = year_index_url(&self.settings.index_url, year)?;
        let mut ctx = CrawlContext::new(year, release_date, self.shutdown.clone());

        let provinces = self.visit(&mut ctx, &index, None, &[]).await?;
        if provinces.is_empty() {
            tracing::warn!("Year {} index at {} lists no provinces", year, index);
        }

        match self.settings.flush_scope {
            FlushScope::Province => self.crawl_by_province(&mut ctx, provinces).await?,
            FlushScope::City => self.crawl_by_city(&mut ctx, provinces).await?,
        }

        ctx.enter(CrawlPhase::Done);
        Ok(ctx.stats)
    }

    /// One batch per province: the province record plus every descendant
    async fn crawl_by_province(
        &mut self,
        ctx: &mut CrawlContext,
        provinces: Vec<ChildPage>,
    ) -> Result<()> {
        // Each province gets committed with its own subtree.
        let mut province_records = std::mem::take(&mut ctx.buffer).into_iter();

        for page in provinces {
            if let Some(record) = province_records.next() {
                ctx.buffer.push(record);
            }
            self.crawl_subtree(ctx, page).await?;
        }

        Ok(())
    }

    /// Provinces and cities first as one batch, then one batch per city
    async fn crawl_by_city(&mut self, ctx: &mut CrawlContext, provinces: Vec<ChildPage>) -> Result<()> {
        tracing::info!("Resolving cities of {} provinces", provinces.len());
        let mut cities = Vec::new();
        for page in &provinces {
            let found = self
                .visit(ctx, &page.url, Some(&page.parent), &page.parents_id)
                .await?;
            cities.extend(found);
        }
        self.flush(ctx, "provinces and cities")?;

        for page in cities {
            self.crawl_subtree(ctx, page).await?;
        }

        Ok(())
    }

    /// Walks the subtree below `root` and commits its buffer
    async fn crawl_subtree(&mut self, ctx: &mut CrawlContext, root: ChildPage) -> Result<()> {
        let name = root.parent.full_name.clone();
        tracing::info!("Downloading {}", name);
        let start = Instant::now();

        self.walk(ctx, root).await?;
        tracing::info!(
            "{} downloaded in {:.2}s",
            name,
            start.elapsed().as_secs_f64()
        );

        self.flush(ctx, &name)
    }

    /// Depth-first, pre-order walk
    ///
    /// Children are pushed in reverse so the first row's page is visited
    /// next, before any of its siblings.
    async fn walk(&self, ctx: &mut CrawlContext, root: ChildPage) -> Result<()> {
        let mut stack = vec![root];

        while let Some(page) = stack.pop() {
            let children = self
                .visit(ctx, &page.url, Some(&page.parent), &page.parents_id)
                .await?;
            if !children.is_empty() {
                ctx.enter(CrawlPhase::RecursingChildren);
                stack.extend(children.into_iter().rev());
            }
        }

        Ok(())
    }

    /// Fetches one page, buffers its records and returns its child pages
    async fn visit(
        &self,
        ctx: &mut CrawlContext,
        url: &Url,
        parent: Option<&ParentNode>,
        parents_id: &[AreaId],
    ) -> Result<Vec<ChildPage>> {
        let Some(body) = self.fetch_page(ctx, url).await? else {
            return Ok(Vec::new());
        };

        ctx.enter(CrawlPhase::Classifying);
        let (level, rows) = match classify(&body) {
            PageClass::Rows { level, rows } => (level, rows),
            PageClass::NoData => {
                tracing::warn!("Placeholder page at {}, branch ends here", url);
                ctx.stats.no_data_pages += 1;
                return Ok(Vec::new());
            }
            PageClass::Unrecognized { document } => {
                tracing::error!("Unrecognized page at {}:\n{}", url, document);
                return Err(AreaError::UnexpectedPageShape {
                    url: url.to_string(),
                    document,
                });
            }
        };
        tracing::debug!("{} rows of {} at {}", rows.len(), level, url);

        ctx.enter(CrawlPhase::BuildingRecords);
        let scope = PageScope {
            url,
            year: ctx.year,
            release_date: ctx.release_date,
            parent,
            parents_id,
        };
        build_records(&rows, level, &scope, &mut ctx.buffer)
    }

    /// Fetches `url`, or None when the page is absent (404)
    ///
    /// Shutdown is checked here and nowhere else.
    async fn fetch_page(&self, ctx: &mut CrawlContext, url: &Url) -> Result<Option<String>> {
        ctx.enter(CrawlPhase::FetchingPage);

        let outcome = tokio::select! {
            biased;
            _ = shutdown_requested(&mut ctx.shutdown) => None,
            fetched = fetch_with_retry(&self.fetcher, url.as_str(), self.settings.retry_delay) => Some(fetched),
        };

        let Some(fetched) = outcome else {
            let discarded = ctx.buffer.len();
            tracing::warn!(
                "Shutdown requested before {}; discarding {} unflushed records of {}",
                url,
                discarded,
                ctx.year
            );
            ctx.buffer.clear();
            return Err(AreaError::Cancelled { discarded });
        };

        let fetched = fetched?;
        ctx.stats.retries += u64::from(fetched.retries);
        match fetched.result {
            FetchResult::Page(body) => {
                ctx.stats.pages_fetched += 1;
                Ok(Some(body))
            }
            FetchResult::NotFound => {
                tracing::warn!("404 at {}, branch ends here", url);
                ctx.stats.pages_missing += 1;
                Ok(None)
            }
        }
    }

    /// Writes the buffer as one batch and clears it
    fn flush(&mut self, ctx: &mut CrawlContext, subtree: &str) -> Result<()> {
        if ctx.buffer.is_empty() {
            return Ok(());
        }

        ctx.enter(CrawlPhase::FlushingBatch);
        let start = Instant::now();
        let written = self
            .storage
            .insert_batch(ctx.year, &ctx.buffer)
            .map_err(|source| {
                tracing::error!("Batch for {} rejected: {}", subtree, source);
                AreaError::Persistence {
                    subtree: subtree.to_string(),
                    source,
                }
            })?;
        ctx.buffer.clear();

        ctx.stats.records_written += written as u64;
        ctx.stats.batches_flushed += 1;
        tracing::info!(
            "Inserted {} records for {} in {:.2}s",
            written,
            subtree,
            start.elapsed().as_secs_f64()
        );

        Ok(())
    }
}

/// Resolves once shutdown has been signalled; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Runs the main crawl operation
///
/// This function orchestrates the entire crawl process:
///
/// 1. Open the SQLite database
/// 2. Build the HTTP client
/// 3. Load the release date of every published year
/// 4. Crawl each configured year, one subtree batch at a time
///
/// # Example
///
/// ```no_run
/// use area_info::config::load_config;
/// use area_info::crawler::run_crawl;
/// use std::path::Path;
/// use tokio::sync::watch;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("area-info.toml"))?;
/// let (_stop, shutdown) = watch::channel(false);
/// run_crawl(&config, shutdown).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<YearReport>> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let client = build_http_client(&config.http, &config.source.index_url)?;
    let fetcher = HttpFetcher::new(client, config.source.encoding.clone());
    let settings = CrawlSettings::from_config(config);

    let releases = fetch_release_dates(&fetcher, &settings.index_url, settings.retry_delay).await?;

    let mut crawler = Crawler::new(fetcher, storage, settings).with_shutdown(shutdown);
    crawler.run(&config.source.years, &releases).await
}
