//! Release date registry
//!
//! The root listing page names every published year together with its
//! release date:
//!
//! ```html
//! <ul class="center_list_contlist">
//!   <li><a href="2021/index.html"><span class="cont_tit">
//!     <font>2021年</font><font>2021-10-31</font>
//!   </span></a></li>
//! </ul>
//! ```
//!
//! It is read once per run, before any year is crawled.

use crate::crawler::fetcher::{fetch_with_retry, FetchError, FetchResult, PageFetcher};
use crate::Result;
use chrono::NaiveDate;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::time::Duration;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y年%m月%d日", "%Y/%m/%d"];

/// Publication year → release date
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseDates {
    dates: BTreeMap<u16, NaiveDate>,
}

impl ReleaseDates {
    /// Parses the root listing page; entries that cannot be read are skipped
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut dates = BTreeMap::new();

        let (Ok(entry), Ok(font)) = (
            Selector::parse("ul.center_list_contlist span.cont_tit"),
            Selector::parse("font"),
        ) else {
            return Self { dates };
        };

        for span in document.select(&entry) {
            let texts: Vec<String> = span
                .select(&font)
                .map(|f| f.text().collect::<String>().trim().to_string())
                .collect();
            let [year_text, date_text, ..] = texts.as_slice() else {
                tracing::warn!("Skipping release entry with {} fields", texts.len());
                continue;
            };

            match (parse_year(year_text), parse_date(date_text)) {
                (Some(year), Some(date)) => {
                    dates.insert(year, date);
                }
                _ => tracing::warn!(
                    "Skipping unreadable release entry '{}' / '{}'",
                    year_text,
                    date_text
                ),
            }
        }

        Self { dates }
    }

    /// Returns the release date of `year`, or None when it was never published
    pub fn release_date_for(&self, year: u16) -> Option<NaiveDate> {
        self.dates.get(&year).copied()
    }

    /// Published years, oldest first
    pub fn years(&self) -> impl Iterator<Item = u16> + '_ {
        self.dates.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl FromIterator<(u16, NaiveDate)> for ReleaseDates {
    fn from_iter<I: IntoIterator<Item = (u16, NaiveDate)>>(iter: I) -> Self {
        Self {
            dates: iter.into_iter().collect(),
        }
    }
}

/// Fetches and parses the root listing page
pub async fn fetch_release_dates<F>(
    fetcher: &F,
    index_url: &str,
    retry_delay: Duration,
) -> Result<ReleaseDates>
where
    F: PageFetcher + ?Sized,
{
    let fetched = fetch_with_retry(fetcher, index_url, retry_delay).await?;
    let FetchResult::Page(body) = fetched.result else {
        return Err(FetchError::UnexpectedStatus {
            url: index_url.to_string(),
            status: 404,
        }
        .into());
    };

    let dates = ReleaseDates::parse(&body);
    tracing::info!("Release dates loaded for {} years", dates.len());
    for (year, date) in &dates.dates {
        tracing::debug!("  {} → {}", year, date);
    }
    Ok(dates)
}

fn parse_year(text: &str) -> Option<u16> {
    text.trim_end_matches('年').trim().parse().ok()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}
