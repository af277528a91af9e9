use crate::config::types::{Config, HttpConfig, OutputConfig, SourceConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

const MIN_YEAR: u16 = 1980;
const MAX_YEAR: u16 = 2100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the crawl source
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.index_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid index-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "index-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    validate_years(&config.years)?;

    if config.encoding.trim().is_empty() {
        return Err(ConfigError::Validation(
            "encoding cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a list of publication years
///
/// Also applied to years given on the command line, which replace the
/// configured list after the file has been validated.
pub fn validate_years(years: &[u16]) -> Result<(), ConfigError> {
    if years.is_empty() {
        return Err(ConfigError::Validation(
            "years must list at least one year".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for year in years {
        if !(MIN_YEAR..=MAX_YEAR).contains(year) {
            return Err(ConfigError::Validation(format!(
                "year must be between {} and {}, got {}",
                MIN_YEAR, MAX_YEAR, year
            )));
        }
        if !seen.insert(*year) {
            return Err(ConfigError::Validation(format!(
                "year {} is listed more than once",
                year
            )));
        }
    }

    Ok(())
}

/// Validates HTTP client settings
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.retry_delay_ms < 100 || config.retry_delay_ms > 600_000 {
        return Err(ConfigError::Validation(format!(
            "retry-delay-ms must be between 100 and 600000, got {}",
            config.retry_delay_ms
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
