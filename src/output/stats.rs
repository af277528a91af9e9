//! Statistics generation from the area database
//!
//! This module provides functionality for extracting and displaying
//! per-year record counts from the storage layer.

use crate::area::AreaLevel;
use crate::storage::Storage;
use crate::AreaError;
use std::collections::BTreeMap;

/// Record counts of one stored year
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearStatistics {
    pub year: u16,

    /// Total number of records
    pub total: u64,

    /// Count of records by level; levels without records are absent
    pub by_level: BTreeMap<AreaLevel, u64>,
}

impl YearStatistics {
    /// Returns the count for `level`, zero when absent
    pub fn count(&self, level: AreaLevel) -> u64 {
        self.by_level.get(&level).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage, newest year first
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Vec<YearStatistics>)` - One entry per stored year
/// * `Err(AreaError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<Vec<YearStatistics>, AreaError> {
    let mut stats = Vec::new();

    for year in storage.years()? {
        let by_level = storage.count_by_level(year)?;
        stats.push(YearStatistics {
            year,
            total: by_level.values().sum(),
            by_level,
        });
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[YearStatistics]) {
    println!("=== Area Statistics ===\n");

    if stats.is_empty() {
        println!("No records stored yet.");
        return;
    }

    for year in stats {
        println!("Year {} ({} records):", year.year, year.total);
        for level in AreaLevel::all() {
            let count = year.count(level);
            let percentage = if year.total > 0 {
                (count as f64 / year.total as f64) * 100.0
            } else {
                0.0
            };
            println!("  {:<9} {:>8} ({:.1}%)", level, count, percentage);
        }
        println!();
    }
}
