//! Area-Info: administrative division crawler
//!
//! This crate walks the statistics bureau's division code directory
//! (province → city → county → town → village), assigns every node a
//! bit-packed identifier derived from its position in the tree, and persists
//! each node to SQLite in subtree-sized batches.

pub mod area;
pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Area-Info operations
#[derive(Debug, Error)]
pub enum AreaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Unexpected page shape at {url}")]
    UnexpectedPageShape { url: String, document: String },

    #[error("Malformed {level} row at {url}: {reason} ({row})")]
    MalformedRow {
        url: String,
        level: area::AreaLevel,
        row: String,
        reason: String,
    },

    #[error("{level} sibling index {index} exceeds the id field capacity of {capacity}")]
    IdOverflow {
        level: area::AreaLevel,
        index: usize,
        capacity: u64,
    },

    #[error("Parent id {parent_id:#x} overlaps the {level} id field")]
    IdParentOverlap {
        level: area::AreaLevel,
        parent_id: u64,
    },

    #[error("Failed to persist subtree {subtree}: {source}")]
    Persistence {
        subtree: String,
        source: storage::StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl cancelled ({discarded} buffered records discarded)")]
    Cancelled { discarded: usize },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Area-Info operations
pub type Result<T> = std::result::Result<T, AreaError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use area::{AreaId, AreaLevel, AreaRecord};
pub use config::Config;
