//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::area::{AreaLevel, AreaRecord};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record {id} belongs to year {found}, batch is for {expected}")]
    YearMismatch { id: u64, expected: u16, found: u16 },

    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: u64, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler only ever appends whole batches; reading is for statistics
/// and verification.
pub trait Storage {
    /// Writes one batch of records for `year` as a single atomic unit
    ///
    /// Either every record is written or none is. Rows that already exist
    /// for the same `(id, year)` are replaced, so re-crawling a year
    /// overwrites it instead of duplicating it.
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn insert_batch(&mut self, year: u16, records: &[AreaRecord]) -> StorageResult<usize>;

    /// Loads every record of `year`, ordered by id
    fn load_year(&self, year: u16) -> StorageResult<Vec<AreaRecord>>;

    /// Counts the records of `year` per level
    fn count_by_level(&self, year: u16) -> StorageResult<BTreeMap<AreaLevel, u64>>;

    /// Lists the years that have at least one record, newest first
    fn years(&self) -> StorageResult<Vec<u16>>;
}
