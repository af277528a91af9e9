//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::area::{AreaId, AreaLevel, AreaRecord};
use crate::storage::schema::{initialize_schema, INSERT_SQL};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

/// A row as read back from `area_info`, before conversion
struct RawAreaRow {
    id: i64,
    number: String,
    name: String,
    full_name: String,
    area_type: Option<u16>,
    level: u8,
    year: u16,
    parents_id: String,
    release_date: String,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and initializes the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl RawAreaRow {
    fn into_record(self) -> StorageResult<AreaRecord> {
        let id = self.id as u64;
        let corrupt = |reason: String| StorageError::CorruptRow { id, reason };

        let level = AreaLevel::from_depth(self.level)
            .ok_or_else(|| corrupt(format!("unknown level {}", self.level)))?;
        let parents: Vec<u64> = serde_json::from_str(&self.parents_id)?;
        let release_date = NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d")
            .map_err(|e| corrupt(format!("bad release_date '{}': {}", self.release_date, e)))?;

        Ok(AreaRecord {
            id: AreaId::from_raw(id),
            number: self.number,
            name: self.name,
            full_name: self.full_name,
            area_type: self.area_type,
            level,
            year: self.year,
            parents_id: parents.into_iter().map(AreaId::from_raw).collect(),
            release_date,
        })
    }
}

impl Storage for SqliteStorage {
    fn insert_batch(&mut self, year: u16, records: &[AreaRecord]) -> StorageResult<usize> {
        if let Some(stray) = records.iter().find(|r| r.year != year) {
            return Err(StorageError::YearMismatch {
                id: stray.id.raw(),
                expected: year,
                found: stray.year,
            });
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL)?;
            for record in records {
                let parents: Vec<u64> = record.parents_id.iter().map(|id| id.raw()).collect();
                let parents_json = serde_json::to_string(&parents)?;
                stmt.execute(params![
                    record.id.raw() as i64,
                    record.number,
                    record.name,
                    record.full_name,
                    record.area_type,
                    record.level.depth(),
                    record.year,
                    parents_json,
                    record.release_date.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    fn load_year(&self, year: u16) -> StorageResult<Vec<AreaRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, number, name, full_name, type, level, year, parents_id, release_date
             FROM area_info WHERE year = ?1",
        )?;

        let rows = stmt
            .query_map(params![year], |row| {
                Ok(RawAreaRow {
                    id: row.get(0)?,
                    number: row.get(1)?,
                    name: row.get(2)?,
                    full_name: row.get(3)?,
                    area_type: row.get(4)?,
                    level: row.get(5)?,
                    year: row.get(6)?,
                    parents_id: row.get(7)?,
                    release_date: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = rows
            .into_iter()
            .map(RawAreaRow::into_record)
            .collect::<StorageResult<Vec<_>>>()?;
        // Province ids use the sign bit once stored, so order in Rust.
        records.sort_by_key(|r| r.id);

        Ok(records)
    }

    fn count_by_level(&self, year: u16) -> StorageResult<BTreeMap<AreaLevel, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT level, COUNT(*) FROM area_info WHERE year = ?1 GROUP BY level")?;
        let rows = stmt.query_map(params![year], |row| {
            Ok((row.get::<_, u8>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            if let Some(level) = AreaLevel::from_depth(depth) {
                counts.insert(level, count as u64);
            }
        }

        Ok(counts)
    }

    fn years(&self) -> StorageResult<Vec<u16>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM area_info ORDER BY year DESC")?;
        let years = stmt
            .query_map([], |row| row.get::<_, u16>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(years)
    }
}
