//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and referer
//! - GET requests decoded with the publisher's charset
//! - Error classification into transient and fatal failures
//! - Fixed-delay retry of transient failures

use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Result of a successful round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// HTTP 200 with the decoded page body
    Page(String),

    /// HTTP 404: the page is absent and its branch has nothing to crawl
    NotFound,
}

/// Failed fetches
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection lost for {url}: {message}")]
    Disconnected { url: String, message: String },

    #[error("Bad gateway (502) for {url}")]
    BadGateway { url: String },

    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Request { url: String, source: reqwest::Error },
}

impl FetchError {
    /// Returns true for failures that are retried after a fixed delay
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Disconnected { .. } | Self::BadGateway { .. }
        )
    }

    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_connect() || error.is_request() || error.is_body() {
            Self::Disconnected {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// Source of page bodies
///
/// The crawler only ever needs one page at a time; retrying transient
/// failures is the caller's job (see [`fetch_with_retry`]).
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResult::Page)` - HTTP 200 with the decoded body
    /// * `Ok(FetchResult::NotFound)` - HTTP 404
    /// * `Err(FetchError)` - transient network failure or unexpected status
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError>;
}

/// `PageFetcher` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    encoding: String,
}

impl HttpFetcher {
    /// Wraps a client; `encoding` decodes bodies that declare no charset
    pub fn new(client: Client, encoding: impl Into<String>) -> Self {
        Self {
            client,
            encoding: encoding.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text_with_charset(&self.encoding)
                    .await
                    .map_err(|e| FetchError::from_reqwest(url, e))?;
                Ok(FetchResult::Page(body))
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!("404 for {}", url);
                Ok(FetchResult::NotFound)
            }
            StatusCode::BAD_GATEWAY => Err(FetchError::BadGateway {
                url: url.to_string(),
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!("Unexpected status {} for {}: {}", status, url, body);
                Err(FetchError::UnexpectedStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            }
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - HTTP settings (timeout, user agent)
/// * `referer` - Sent as the `Referer` header; the publisher expects its
///   own listing page here
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig, referer: &str) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(referer) {
        headers.insert(REFERER, value);
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// A fetched page and the number of retries it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub result: FetchResult,
    pub retries: u32,
}

/// Fetches `url`, retrying transient failures forever with a fixed delay
///
/// # Retry Logic
///
/// | Condition              | Action                   |
/// |------------------------|--------------------------|
/// | HTTP 200               | Return the page          |
/// | HTTP 404               | Return `NotFound`        |
/// | HTTP 502               | Sleep `delay`, retry     |
/// | Timeout                | Sleep `delay`, retry     |
/// | Connection dropped     | Sleep `delay`, retry     |
/// | Any other status/error | Return the error         |
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    url: &str,
    delay: Duration,
) -> Result<Fetched, FetchError>
where
    F: PageFetcher + ?Sized,
{
    let mut retries = 0;
    loop {
        match fetcher.get(url).await {
            Ok(result) => return Ok(Fetched { result, retries }),
            Err(e) if e.is_transient() => {
                retries += 1;
                tracing::warn!("{}; retry {} in {}ms", e, retries, delay.as_millis());
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
