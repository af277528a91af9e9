//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small division directory and run
//! the full crawl cycle end-to-end against a temporary SQLite database.
//! Cancellation and storage failures are driven through in-process fakes.

use area_info::config::{Config, CrawlerConfig, FlushScope, HttpConfig, OutputConfig, SourceConfig};
use area_info::crawler::{
    build_http_client, classify, run_crawl, CrawlSettings, Crawler, FetchError, FetchResult,
    HttpFetcher, PageClass, PageFetcher, ReleaseDates,
};
use area_info::storage::{SqliteStorage, Storage, StorageError, StorageResult};
use area_info::{AreaError, AreaId, AreaLevel, AreaRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ROOT: &str = "/tjyqhdmhcxhfdm/";

const LISTING: &str = r#"<html><body><ul class="center_list_contlist">
    <li><a href="2021/index.html"><span class="cont_tit">
        <font class="cont_tit03">2021年</font><font class="cont_tit02">2021-10-31</font>
    </span></a></li>
</ul></body></html>"#;

/// A two-province directory; Guangdong's Dongguan lists towns directly
/// and the page below its town is missing.
const PAGES: [(&str, &str); 6] = [
    (
        "2021/index.html",
        r#"<table><tr class="provincetr">
            <td><a href="11.html">北京市<br/></a></td>
            <td>台湾省</td>
            <td><a href="44.html">广东省<br/></a></td>
        </tr></table>"#,
    ),
    (
        "2021/11.html",
        r#"<table><tr class="citytr">
            <td><a href="11/1101.html">110100000000</a></td><td><a href="11/1101.html">市辖区</a></td>
        </tr></table>"#,
    ),
    (
        "2021/11/1101.html",
        r#"<table>
            <tr class="countytr"><td><a href="01/110101.html">110101000000</a></td><td><a href="01/110101.html">东城区</a></td></tr>
            <tr class="countytr"><td>110102000000</td><td>西城区</td></tr>
        </table>"#,
    ),
    (
        "2021/11/01/110101.html",
        r#"<table><tr class="towntr">
            <td><a href="01/110101001.html">110101001000</a></td><td><a href="01/110101001.html">东华门街道</a></td>
        </tr></table>"#,
    ),
    (
        "2021/11/01/01/110101001.html",
        r#"<table>
            <tr class="villagetr"><td>110101001001</td><td>111</td><td>多福巷社区居委会</td></tr>
            <tr class="villagetr"><td>110101001002</td><td>111</td><td>银闸社区居委会</td></tr>
        </table>"#,
    ),
    (
        "2021/44.html",
        r#"<table><tr class="citytr">
            <td><a href="44/4419.html">441900000000</a></td><td><a href="44/4419.html">东莞市</a></td>
        </tr></table>"#,
    ),
];

/// Served separately so tests can replace it
const DONGGUAN: (&str, &str) = (
    "2021/44/4419.html",
    r#"<table><tr class="towntr">
        <td><a href="19/441900003.html">441900003000</a></td><td><a href="19/441900003.html">东城街道</a></td>
    </tr></table>"#,
);

const BEIJING: u64 = 1 << 48;
const GUANGDONG: u64 = 2 << 48;

fn release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 10, 31).unwrap()
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}{}", ROOT, page)))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Starts a mock server with the listing and every fixture page
async fn start_site() -> MockServer {
    let server = MockServer::start().await;
    mount_page(&server, "index.html", LISTING).await;
    for (page, body) in PAGES {
        mount_page(&server, page, body).await;
    }
    server
}

/// Creates a test configuration pointing at `server`
fn create_test_config(server: &MockServer, db_path: &Path, flush_scope: FlushScope) -> Config {
    Config {
        source: SourceConfig {
            index_url: format!("{}{}index.html", server.uri(), ROOT),
            years: vec![2021],
            encoding: "gb18030".to_string(),
        },
        http: HttpConfig {
            timeout_secs: 2,
            retry_delay_ms: 100,
            user_agent: "area-info-test".to_string(),
        },
        crawler: CrawlerConfig { flush_scope },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
    }
}

fn load_by_name(db_path: &Path) -> HashMap<String, AreaRecord> {
    let storage = SqliteStorage::new(db_path).expect("Failed to open database");
    storage
        .load_year(2021)
        .expect("Failed to load records")
        .into_iter()
        .map(|r| (r.full_name.clone(), r))
        .collect()
}

fn assert_lineage_consistent(records: &HashMap<String, AreaRecord>) {
    for record in records.values() {
        assert_eq!(
            record.parents_id,
            record.id.ancestors(),
            "parents_id of {} does not match its id",
            record.full_name
        );
        if let Some(parent) = record.parents_id.last() {
            assert!(
                records.values().any(|r| r.id == *parent),
                "parent of {} was not stored",
                record.full_name
            );
        }
    }
}

#[tokio::test]
async fn test_full_crawl_end_to_end() {
    let server = start_site().await;
    mount_page(&server, DONGGUAN.0, DONGGUAN.1).await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::Province);

    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.expect("Crawl failed");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].year, 2021);
    assert_eq!(reports[0].release_date, release_date());
    let stats = &reports[0].stats;
    assert_eq!(stats.records_written, 10);
    assert_eq!(stats.batches_flushed, 2);
    assert_eq!(stats.pages_fetched, 7);
    assert_eq!(stats.pages_missing, 1);
    assert_eq!(stats.retries, 0);

    let records = load_by_name(&db_path);
    assert_eq!(records.len(), 10);
    assert!(!records.contains_key("台湾省"));

    let beijing = &records["北京市"];
    assert_eq!(beijing.id.raw(), BEIJING);
    assert_eq!(beijing.number, "110000000000");
    assert_eq!(beijing.level, AreaLevel::Province);
    assert!(beijing.parents_id.is_empty());
    assert_eq!(beijing.release_date, release_date());

    let district = &records["北京市/市辖区"];
    assert_eq!(district.id.raw(), (1 << 36) + BEIJING);
    assert_eq!(district.number, "110100000000");
    assert_eq!(district.parents_id, vec![AreaId::from_raw(BEIJING)]);

    assert_eq!(records["北京市/市辖区/西城区"].id.raw(), 2 * (1 << 24) + (1 << 36) + BEIJING);

    let village = &records["北京市/市辖区/东城区/东华门街道/银闸社区居委会"];
    assert_eq!(village.level, AreaLevel::Village);
    assert_eq!(village.area_type, Some(111));
    assert_eq!(village.parents_id.len(), 4);
    assert_eq!(
        village.id.raw(),
        2 + (1 << 12) + (1 << 24) + (1 << 36) + BEIJING
    );

    // Towns straight under a city keep an empty county field.
    assert_eq!(records["广东省"].id.raw(), GUANGDONG);
    let town = &records["广东省/东莞市/东城街道"];
    assert_eq!(town.level, AreaLevel::Town);
    assert_eq!(town.id.raw(), (1 << 12) + (1 << 36) + GUANGDONG);
    assert_eq!(town.parents_id.len(), 2);

    assert_lineage_consistent(&records);
}

#[tokio::test]
async fn test_single_province_with_leaf_cities() {
    let server = MockServer::start().await;
    mount_page(&server, "index.html", LISTING).await;
    mount_page(
        &server,
        "2021/index.html",
        r#"<table><tr class="provincetr"><td><a href="11.html">北京市</a></td></tr></table>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("{}2021/11.html", ROOT)))
        .respond_with(html(
            r#"<table>
                <tr class="citytr"><td>110100000000</td><td>市辖区</td></tr>
                <tr class="citytr"><td>110200000000</td><td>县</td></tr>
            </table>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::Province);
    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.unwrap();

    // index and the city page, nothing below
    assert_eq!(reports[0].stats.pages_fetched, 2);
    assert_eq!(reports[0].stats.pages_missing, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let records = storage.load_year(2021).unwrap();
    assert_eq!(records.len(), 3);

    let p = AreaId::from_raw(BEIJING);
    assert_eq!(records[0].id, p);
    assert_eq!(records[0].level, AreaLevel::Province);
    assert!(records[0].parents_id.is_empty());

    let cities: Vec<&AreaRecord> = records.iter().filter(|r| r.level == AreaLevel::City).collect();
    assert_eq!(cities.len(), 2);
    assert_eq!(cities[0].id.raw(), (1 << 36) + BEIJING);
    assert_eq!(cities[1].id.raw(), 2 * (1 << 36) + BEIJING);
    assert!(cities.iter().all(|c| c.parents_id == vec![p]));
}

#[tokio::test]
async fn test_missing_branch_does_not_stop_siblings() {
    let server = MockServer::start().await;
    mount_page(&server, "index.html", LISTING).await;
    mount_page(
        &server,
        "2021/index.html",
        r#"<table><tr class="provincetr">
            <td><a href="11.html">北京市</a></td>
            <td><a href="12.html">天津市</a></td>
        </tr></table>"#,
    )
    .await;
    // 11.html is not mounted and answers 404.
    mount_page(
        &server,
        "2021/12.html",
        r#"<table><tr class="citytr"><td>120100000000</td><td>市辖区</td></tr></table>"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::Province);
    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.unwrap();

    assert_eq!(reports[0].stats.pages_missing, 1);
    let records = load_by_name(&db_path);
    assert_eq!(records.len(), 3);
    assert!(records.contains_key("北京市"));
    assert!(!records.keys().any(|name| name.starts_with("北京市/")));
    assert_eq!(records["天津市/市辖区"].id.raw(), (1 << 36) + (2 << 48));
}

#[tokio::test]
async fn test_referer_is_the_listing_page() {
    let server = MockServer::start().await;
    let listing = format!("{}{}index.html", server.uri(), ROOT);
    mount_page(&server, "index.html", LISTING).await;
    Mock::given(method("GET"))
        .and(path(format!("{}2021/index.html", ROOT)))
        .and(header("referer", listing.as_str()))
        .respond_with(html(r#"<table><tr class="provincetr"><td>台湾省</td></tr></table>"#))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir.path().join("areas.db"), FlushScope::Province);
    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.unwrap();

    assert_eq!(reports[0].stats.records_written, 0);
    assert_eq!(reports[0].stats.pages_missing, 0);
}

#[tokio::test]
async fn test_undeclared_charset_falls_back_to_gb18030() {
    let server = MockServer::start().await;
    // "北京市" in GB18030, served without a charset parameter.
    let mut body = br#"<table><tr class="provincetr"><td><a href="11.html">"#.to_vec();
    body.extend_from_slice(&[0xB1, 0xB1, 0xBE, 0xA9, 0xCA, 0xD0]);
    body.extend_from_slice(b"</a></td></tr></table>");
    Mock::given(method("GET"))
        .and(path(format!("{}2021/index.html", ROOT)))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let listing = format!("{}{}index.html", server.uri(), ROOT);
    let client = build_http_client(&HttpConfig::default(), &listing).unwrap();
    let fetcher = HttpFetcher::new(client, "gb18030");

    let url = format!("{}{}2021/index.html", server.uri(), ROOT);
    let page = match fetcher.get(&url).await.unwrap() {
        FetchResult::Page(page) => page,
        other => panic!("expected a page, got {:?}", other),
    };

    match classify(&page) {
        PageClass::Rows { level, rows } => {
            assert_eq!(level, AreaLevel::Province);
            assert_eq!(rows[0].cells[0].text, "北京市");
            assert_eq!(rows[0].cells[0].href.as_deref(), Some("11.html"));
        }
        other => panic!("expected province rows, got {:?}", other),
    }
}

#[tokio::test]
async fn test_recrawl_is_idempotent() {
    let server = start_site().await;
    mount_page(&server, DONGGUAN.0, DONGGUAN.1).await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::Province);

    let (_stop, shutdown) = watch::channel(false);
    run_crawl(&config, shutdown.clone()).await.unwrap();
    let first = load_by_name(&db_path);
    run_crawl(&config, shutdown).await.unwrap();
    let second = load_by_name(&db_path);

    assert_eq!(first.len(), 10);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_city_flush_scope_stores_the_same_tree() {
    let server = start_site().await;
    mount_page(&server, DONGGUAN.0, DONGGUAN.1).await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::City);

    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.unwrap();

    // provinces and cities, Beijing's 市辖区, Dongguan
    assert_eq!(reports[0].stats.batches_flushed, 3);
    assert_eq!(reports[0].stats.records_written, 10);

    let records = load_by_name(&db_path);
    assert_eq!(records.len(), 10);
    assert_eq!(records["广东省/东莞市"].id.raw(), (1 << 36) + GUANGDONG);
    assert_lineage_consistent(&records);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    mount_page(&server, DONGGUAN.0, DONGGUAN.1).await;
    // Mounted first, so they answer until used up.
    Mock::given(method("GET"))
        .and(path(format!("{}2021/44.html", ROOT)))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_page(&server, "index.html", LISTING).await;
    for (page, body) in PAGES {
        mount_page(&server, page, body).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::Province);

    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.unwrap();

    assert_eq!(reports[0].stats.retries, 3);
    assert_eq!(reports[0].stats.records_written, 10);
    let records = load_by_name(&db_path);
    assert_eq!(records.len(), 10);
    assert_eq!(
        records.values().filter(|r| r.name == "东莞市").count(),
        1
    );
}

#[tokio::test]
async fn test_unexpected_page_keeps_committed_provinces() {
    let server = start_site().await;
    mount_page(&server, DONGGUAN.0, "<html><body><p>系统维护中</p></body></html>").await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let config = create_test_config(&server, &db_path, FlushScope::Province);

    let (_stop, shutdown) = watch::channel(false);
    let err = run_crawl(&config, shutdown).await.unwrap_err();

    match err {
        AreaError::UnexpectedPageShape { url, document } => {
            assert!(url.ends_with("/2021/44/4419.html"));
            assert!(document.contains("系统维护中"));
        }
        other => panic!("expected an unexpected page shape, got {:?}", other),
    }
    let records = load_by_name(&db_path);
    assert_eq!(records.len(), 7);
    assert!(records.keys().all(|name| name.starts_with("北京市")));
}

#[tokio::test]
async fn test_years_without_release_are_skipped() {
    let server = start_site().await;
    mount_page(&server, DONGGUAN.0, DONGGUAN.1).await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("areas.db");
    let mut config = create_test_config(&server, &db_path, FlushScope::Province);
    config.source.years = vec![2022, 2021];

    let (_stop, shutdown) = watch::channel(false);
    let reports = run_crawl(&config, shutdown).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].year, 2021);
    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.years().unwrap(), vec![2021]);
}

const BASE: &str = "http://example.com/tjyqhdmhcxhfdm/";

/// Serves the fixture pages in-process; flips `stop` when `trip_on` is fetched
struct LocalSite {
    pages: HashMap<String, String>,
    trip_on: Option<(String, watch::Sender<bool>)>,
}

impl LocalSite {
    fn new() -> Self {
        let pages = PAGES
            .iter()
            .chain(std::iter::once(&DONGGUAN))
            .map(|(page, body)| (format!("{}{}", BASE, page), body.to_string()))
            .collect();
        Self {
            pages,
            trip_on: None,
        }
    }

    fn trip_on(mut self, page: &str, stop: watch::Sender<bool>) -> Self {
        self.trip_on = Some((format!("{}{}", BASE, page), stop));
        self
    }
}

#[async_trait]
impl PageFetcher for LocalSite {
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        if let Some((trip, stop)) = &self.trip_on {
            if trip == url {
                let _ = stop.send(true);
            }
        }
        Ok(self
            .pages
            .get(url)
            .map(|body| FetchResult::Page(body.clone()))
            .unwrap_or(FetchResult::NotFound))
    }
}

/// Delegates to SQLite but fails the `fail_on`-th batch (1-based)
struct FlakyStorage {
    inner: SqliteStorage,
    fail_on: usize,
    batches: usize,
}

impl Storage for FlakyStorage {
    fn insert_batch(&mut self, year: u16, records: &[AreaRecord]) -> StorageResult<usize> {
        self.batches += 1;
        if self.batches == self.fail_on {
            return Err(StorageError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
                Some("database or disk is full".to_string()),
            )));
        }
        self.inner.insert_batch(year, records)
    }

    fn load_year(&self, year: u16) -> StorageResult<Vec<AreaRecord>> {
        self.inner.load_year(year)
    }

    fn count_by_level(&self, year: u16) -> StorageResult<BTreeMap<AreaLevel, u64>> {
        self.inner.count_by_level(year)
    }

    fn years(&self) -> StorageResult<Vec<u16>> {
        self.inner.years()
    }
}

fn local_settings() -> CrawlSettings {
    CrawlSettings {
        index_url: format!("{}index.html", BASE),
        retry_delay: Duration::from_millis(100),
        flush_scope: FlushScope::Province,
    }
}

#[tokio::test]
async fn test_failed_batch_keeps_earlier_batches() {
    let storage = FlakyStorage {
        inner: SqliteStorage::new_in_memory().unwrap(),
        fail_on: 2,
        batches: 0,
    };
    let mut crawler = Crawler::new(LocalSite::new(), storage, local_settings());

    let err = crawler.crawl_year(2021, release_date()).await.unwrap_err();

    match err {
        AreaError::Persistence { subtree, .. } => assert_eq!(subtree, "广东省"),
        other => panic!("expected a persistence failure, got {:?}", other),
    }
    let stored = crawler.storage().load_year(2021).unwrap();
    assert_eq!(stored.len(), 7);
    assert!(stored.iter().all(|r| r.full_name.starts_with("北京市")));
}

#[tokio::test]
async fn test_cancellation_stops_at_next_fetch() {
    let (stop, shutdown) = watch::channel(false);
    let site = LocalSite::new().trip_on("2021/44.html", stop);
    let mut crawler = Crawler::new(site, SqliteStorage::new_in_memory().unwrap(), local_settings())
        .with_shutdown(shutdown);

    let releases: ReleaseDates = [(2021, release_date())].into_iter().collect();
    let err = crawler.run(&[2021], &releases).await.unwrap_err();

    // 广东省 and 东莞市 were buffered when the stop arrived.
    assert!(matches!(err, AreaError::Cancelled { discarded: 2 }));
    let stored = crawler.storage().load_year(2021).unwrap();
    assert_eq!(stored.len(), 7);
    assert!(stored.iter().all(|r| r.full_name.starts_with("北京市")));
}
