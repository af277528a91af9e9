//! Configuration module for Area-Info
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use area_info::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("area-info.toml")).unwrap();
//! println!("Crawling years: {:?}", config.source.years);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, FlushScope, HttpConfig, OutputConfig, SourceConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, year_index_url};

// Re-export validation for values given outside the config file
pub use validation::validate_years;
