//! Output module for crawl reports and database statistics
//!
//! This module handles:
//! - Per-year record counts read back from storage
//! - The end-of-run summary of each crawled year

pub mod stats;

pub use stats::{load_statistics, print_statistics, YearStatistics};

use crate::crawler::YearReport;

/// Prints the end-of-run summary of each crawled year
pub fn print_reports(reports: &[YearReport]) {
    println!("=== Crawl Summary ===\n");

    if reports.is_empty() {
        println!("No year was crawled.");
        return;
    }

    for report in reports {
        let stats = &report.stats;
        println!("Year {} (released {}):", report.year, report.release_date);
        println!("  Records written: {}", stats.records_written);
        println!("  Batches flushed: {}", stats.batches_flushed);
        println!("  Pages fetched: {}", stats.pages_fetched);
        println!("  Pages missing (404): {}", stats.pages_missing);
        println!("  Placeholder pages: {}", stats.no_data_pages);
        println!("  Retries: {}", stats.retries);
        println!();
    }
}
