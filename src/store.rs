use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::aggregate::{SessionRecord, SessionResult, StrengthSummary};
use crate::app_dirs::AppDirs;
use crate::step::SessionMode;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("could not encode samples: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where finished sessions go. Baseline sessions replace the stored
/// reference; regular sessions are appended.
pub trait ResultsStore {
    /// Returns the row id the record was stored under.
    fn record(&mut self, record: &SessionRecord) -> Result<i64, StoreError>;
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at TEXT NOT NULL,
        rom REAL NOT NULL,
        strength_max REAL NOT NULL,
        strength_avg REAL NOT NULL,
        samples TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_measurements_recorded_at ON measurements(recorded_at);
    CREATE TABLE IF NOT EXISTS baseline (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        recorded_at TEXT NOT NULL,
        rom REAL NOT NULL,
        strength_max REAL NOT NULL,
        strength_avg REAL NOT NULL,
        samples TEXT NOT NULL
    );
"#;

/// SQLite-backed results store
#[derive(Debug)]
pub struct SqliteResultsStore {
    conn: Connection,
}

impl SqliteResultsStore {
    /// Open the store at the default state location, creating it if needed.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("rightangle_results.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn latest_baseline(&self) -> Result<Option<SessionRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT recorded_at, rom, strength_max, strength_avg, samples
                FROM baseline WHERE id = 1
                "#,
                [],
                |row| record_from_row(row, SessionMode::Baseline),
            )
            .optional()?;
        Ok(record)
    }

    /// Most recent regular measurements, newest first.
    pub fn recent_measurements(&self, limit: usize) -> Result<Vec<SessionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT recorded_at, rom, strength_max, strength_avg, samples
            FROM measurements
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            record_from_row(row, SessionMode::Regular)
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    pub fn measurement_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Clear all stored results (for testing or reset purposes)
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch("DELETE FROM measurements; DELETE FROM baseline;")?;
        Ok(())
    }
}

impl ResultsStore for SqliteResultsStore {
    fn record(&mut self, record: &SessionRecord) -> Result<i64, StoreError> {
        let result = &record.result;
        let samples = serde_json::to_string(&result.samples)?;
        let recorded_at = record.recorded_at.to_rfc3339();

        let id = match record.mode {
            SessionMode::Baseline => {
                self.conn.execute(
                    r#"
                    INSERT OR REPLACE INTO baseline
                    (id, recorded_at, rom, strength_max, strength_avg, samples)
                    VALUES (1, ?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        recorded_at,
                        result.rom,
                        result.strength.max,
                        result.strength.avg,
                        samples
                    ],
                )?;
                1
            }
            SessionMode::Regular => {
                self.conn.execute(
                    r#"
                    INSERT INTO measurements
                    (recorded_at, rom, strength_max, strength_avg, samples)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![
                        recorded_at,
                        result.rom,
                        result.strength.max,
                        result.strength.avg,
                        samples
                    ],
                )?;
                self.conn.last_insert_rowid()
            }
        };

        info!(mode = %record.mode, id, rom = result.rom, "session result stored");
        Ok(id)
    }
}

fn record_from_row(row: &Row<'_>, mode: SessionMode) -> rusqlite::Result<SessionRecord> {
    let recorded_at: String = row.get(0)?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?
        .with_timezone(&Utc);

    let samples: String = row.get(4)?;
    let samples = serde_json::from_str(&samples).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SessionRecord {
        mode,
        recorded_at,
        result: SessionResult {
            rom: row.get(1)?,
            strength: StrengthSummary {
                max: row.get(2)?,
                avg: row.get(3)?,
            },
            samples,
        },
    })
}

/// In-process store; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultsStore {
    records: Arc<Mutex<Vec<SessionRecord>>>,
}

impl MemoryResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ResultsStore for MemoryResultsStore {
    fn record(&mut self, record: &SessionRecord) -> Result<i64, StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        records.push(record.clone());
        Ok(records.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{Sample, TaggedSample};
    use chrono::TimeZone;

    fn record(mode: SessionMode, millis: i64, rom: f64) -> SessionRecord {
        SessionRecord {
            mode,
            recorded_at: Utc.timestamp_millis_opt(millis).unwrap(),
            result: SessionResult {
                rom,
                strength: StrengthSummary { max: 25.0, avg: 17.67 },
                samples: vec![TaggedSample {
                    sample: Sample::new(millis, 25.0),
                    relevant: true,
                }],
            },
        }
    }

    #[test]
    fn regular_sessions_are_appended() {
        let mut store = SqliteResultsStore::open_in_memory().unwrap();
        let first = store.record(&record(SessionMode::Regular, 1_000, 90.0)).unwrap();
        let second = store.record(&record(SessionMode::Regular, 2_000, 95.0)).unwrap();
        assert!(second > first);
        assert_eq!(store.measurement_count().unwrap(), 2);

        let recent = store.recent_measurements(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].result.rom, 95.0);
        assert_eq!(recent[1].result.rom, 90.0);
        assert!(store.latest_baseline().unwrap().is_none());
    }

    #[test]
    fn baseline_is_replaced() {
        let mut store = SqliteResultsStore::open_in_memory().unwrap();
        store.record(&record(SessionMode::Baseline, 1_000, 80.0)).unwrap();
        store.record(&record(SessionMode::Baseline, 2_000, 85.0)).unwrap();

        let baseline = store.latest_baseline().unwrap().unwrap();
        assert_eq!(baseline.mode, SessionMode::Baseline);
        assert_eq!(baseline.result.rom, 85.0);
        assert_eq!(store.measurement_count().unwrap(), 0);
    }

    #[test]
    fn stored_record_roundtrips_samples_and_time() {
        let mut store = SqliteResultsStore::open_in_memory().unwrap();
        let original = record(SessionMode::Regular, 1_700_000_000_123, 95.0);
        store.record(&original).unwrap();
        let loaded = store.recent_measurements(1).unwrap().remove(0);
        assert_eq!(loaded, original);
    }

    #[test]
    fn recent_measurements_respects_limit() {
        let mut store = SqliteResultsStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .record(&record(SessionMode::Regular, 1_000 * (i + 1), 80.0 + i as f64))
                .unwrap();
        }
        let recent = store.recent_measurements(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].result.rom, 84.0);
    }

    #[test]
    fn clear_all_empties_both_tables() {
        let mut store = SqliteResultsStore::open_in_memory().unwrap();
        store.record(&record(SessionMode::Baseline, 1_000, 80.0)).unwrap();
        store.record(&record(SessionMode::Regular, 2_000, 90.0)).unwrap();
        store.clear_all().unwrap();
        assert!(store.latest_baseline().unwrap().is_none());
        assert_eq!(store.measurement_count().unwrap(), 0);
    }

    #[test]
    fn memory_store_shares_records() {
        let mut store = MemoryResultsStore::new();
        let view = store.clone();
        store.record(&record(SessionMode::Regular, 1_000, 90.0)).unwrap();
        assert_eq!(view.records().len(), 1);
    }
}
