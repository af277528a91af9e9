use serde::Deserialize;

/// Main configuration structure for Area-Info
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Where and what to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Root listing page; also the base of every per-year index URL
    #[serde(rename = "index-url")]
    pub index_url: String,

    /// Publication years to crawl, in order
    pub years: Vec<u16>,

    /// Charset used when a response does not declare one
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Total request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed delay before retrying a timed-out or dropped request (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

/// Crawl behaviour configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlerConfig {
    /// Which subtree one database batch covers
    #[serde(rename = "flush-scope", default)]
    pub flush_scope: FlushScope,
}

/// Granularity of the persistence checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushScope {
    /// One batch per province and all of its descendants
    #[default]
    Province,

    /// Provinces and cities are resolved up front and flushed together,
    /// then one batch per city subtree
    City,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_encoding() -> String {
    "gb18030".to_string()
}

fn default_timeout_secs() -> u64 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    concat!("area-info/", env!("CARGO_PKG_VERSION")).to_string()
}
