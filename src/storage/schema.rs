//! Database schema definitions
//!
//! This module contains the SQL schema of the area database.

/// SQL schema for the database
///
/// `id` holds the bit-packed area id. Province ids use the top bits of a
/// `u64`, so values are stored through `i64` with the same bit pattern.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS area_info (
    id INTEGER NOT NULL,
    number TEXT NOT NULL,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    type INTEGER,
    level INTEGER NOT NULL,
    year INTEGER NOT NULL,
    parents_id TEXT NOT NULL,
    release_date TEXT NOT NULL,
    create_time TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
    PRIMARY KEY (id, year)
);

CREATE INDEX IF NOT EXISTS idx_area_info_year_level ON area_info(year, level);
CREATE INDEX IF NOT EXISTS idx_area_info_number ON area_info(number);
"#;

/// SQL used for every inserted row
pub const INSERT_SQL: &str = "INSERT OR REPLACE INTO area_info
    (id, number, name, full_name, type, level, year, parents_id, release_date)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
