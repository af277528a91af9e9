use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use area_info::config::load_config;
///
/// let config = load_config(Path::new("area-info.toml")).unwrap();
/// println!("Years: {:?}", config.source.years);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;

    Ok(config)
}

/// Hex-encoded SHA-256 of the raw config file
///
/// Logged at startup so the rows of a run can be traced back to the exact
/// year list and source it was started with.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Returns the index page URL of one publication year
///
/// The per-year index lives next to the root listing page:
/// `.../tjyqhdmhcxhfdm/index.html` becomes `.../tjyqhdmhcxhfdm/2021/index.html`.
pub fn year_index_url(index_url: &str, year: u16) -> Result<Url, ::url::ParseError> {
    Url::parse(index_url)?.join(&format!("{}/index.html", year))
}
