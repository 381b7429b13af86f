//! Metrics store: WAL-mode single-file database with connection-scoped access.
//!
//! There is no server process and no lock manager. Safety between the
//! continuously-appending collector and episodic readers comes entirely from
//! access-mode discipline:
//!
//! - the writer opens read-write, inserts one row, commits, and drops the
//!   connection before the cycle's idle sleep — it never holds a connection
//!   across cycles;
//! - readers open with `SQLITE_OPEN_READ_ONLY` and drop the connection when
//!   the statement finishes, on success and on error alike.
//!
//! WAL mode guarantees a read-only connection opened during a write sees
//! either the pre-write or post-commit state, never a partial row, and never
//! a "file already locked" failure. Two simultaneous writers are the one
//! incompatible combination; the loser surfaces as the retryable `StoreBusy`.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, params};

use crate::core::errors::{Result, TqhError};
use crate::store::sample::TelemetrySample;

/// The single telemetry table.
pub const TABLE_NAME: &str = "system_metrics";

/// Fixed schema, column name → declared type. Known to the translator at
/// prompt-construction time; never inferred.
pub const SCHEMA_COLUMNS: [(&str, &str); 5] = [
    ("timestamp", "TIMESTAMP"),
    ("hostname", "VARCHAR"),
    ("cpu_usage", "DOUBLE"),
    ("memory_usage", "DOUBLE"),
    ("disk_usage", "DOUBLE"),
];

/// Handle to the store file. Holds a path, never a connection.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    db_path: PathBuf,
}

impl MetricsStore {
    /// Create a handle. Does not touch the filesystem.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the store file exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.db_path.exists()
    }

    /// Create the file, table, and indexes if absent. Idempotent.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.open_writer()?;
        drop(conn);
        Ok(())
    }

    /// Append exactly one row and release the connection before returning.
    ///
    /// A duplicate `(timestamp, hostname)` pair surfaces as `DuplicateSample`
    /// so the collector can log-and-skip without retrying.
    pub fn append(&self, sample: &TelemetrySample) -> Result<()> {
        let conn = self.open_writer()?;
        let outcome = conn
            .prepare_cached(
                "INSERT INTO system_metrics (
                timestamp, hostname, cpu_usage, memory_usage, disk_usage
            ) VALUES (?1,?2,?3,?4,?5)",
            )?
            .execute(params![
                sample.timestamp_text(),
                sample.hostname,
                sample.cpu_usage,
                sample.memory_usage,
                sample.disk_usage,
            ]);
        match outcome {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(ffi_err, _))
                if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(TqhError::DuplicateSample {
                    hostname: sample.hostname.clone(),
                    timestamp: sample.timestamp_text(),
                })
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Execute one read-only statement, collecting at most `max_rows` rows.
    ///
    /// The connection is opened strictly read-only and released on every exit
    /// path. Engine errors for a statement that parses but fails (unknown
    /// column, type mismatch) surface as `QueryFailed` carrying the engine's
    /// message; lock contention surfaces as `StoreBusy`.
    pub fn query_with_limit(&self, sql: &str, max_rows: usize) -> Result<ResultSet> {
        let conn = self.open_reader()?;
        let mut stmt = conn.prepare(sql).map_err(exec_error)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();

        let mut rows = stmt.query([]).map_err(exec_error)?;
        let mut collected: Vec<Vec<CellValue>> = Vec::new();
        let mut truncated = false;
        loop {
            let Some(row) = rows.next().map_err(exec_error)? else {
                break;
            };
            if collected.len() >= max_rows {
                truncated = true;
                break;
            }
            let mut record = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let cell = match row.get_ref(idx).map_err(exec_error)? {
                    ValueRef::Null => CellValue::Null,
                    ValueRef::Integer(v) => CellValue::Integer(v),
                    ValueRef::Real(v) => CellValue::Real(v),
                    ValueRef::Text(t) => CellValue::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(b) => CellValue::Text(format!("<blob {} bytes>", b.len())),
                };
                record.push(cell);
            }
            collected.push(record);
        }

        Ok(ResultSet {
            columns,
            rows: collected,
            truncated,
        })
    }

    /// Total row count (read-only).
    pub fn count_rows(&self) -> Result<i64> {
        let conn = self.open_reader()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM system_metrics", [], |row| row.get(0))
            .map_err(exec_error)?;
        Ok(count)
    }

    /// Timestamp text of the newest row, if any (read-only).
    pub fn newest_timestamp(&self) -> Result<Option<String>> {
        let conn = self.open_reader()?;
        let newest: Option<String> = conn
            .query_row("SELECT MAX(timestamp) FROM system_metrics", [], |row| {
                row.get(0)
            })
            .map_err(exec_error)?;
        Ok(newest)
    }

    // ──────────────────── connections ────────────────────

    fn open_writer(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| TqhError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_writer_pragmas(&conn)?;
        apply_schema(&conn)?;
        Ok(conn)
    }

    fn open_reader(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        // Readers in WAL mode never block on the writer; the timeout only
        // matters for the brief checkpoint window.
        conn.pragma_update(None, "busy_timeout", 1_000)?;
        Ok(conn)
    }
}

/// Map engine errors at statement execution time: busy stays retryable,
/// everything else is the caller-visible `QueryFailed`.
fn exec_error(error: rusqlite::Error) -> TqhError {
    match TqhError::from(error) {
        TqhError::Sql { details, .. } => TqhError::QueryFailed { details },
        other => other,
    }
}

// ──────────────────── result set ────────────────────

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v:.2}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Tabular result of one read-only query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    /// True when the row cap clipped the result.
    pub truncated: bool,
}

impl ResultSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Render as an aligned text table for terminal output.
    #[must_use]
    pub fn render_table(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        let mut widths: Vec<usize> = self.columns.iter().map(String::len).collect();
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();
        for row in &rendered {
            for (idx, cell) in row.iter().enumerate() {
                if idx < widths.len() {
                    widths[idx] = widths[idx].max(cell.len());
                }
            }
        }

        let mut out = String::new();
        for (idx, name) in self.columns.iter().enumerate() {
            let _ = write!(out, "{:<width$}  ", name, width = widths[idx]);
        }
        out.push('\n');
        for row in &rendered {
            for (idx, cell) in row.iter().enumerate() {
                let _ = write!(out, "{:<width$}  ", cell, width = widths[idx]);
            }
            out.push('\n');
        }
        if self.truncated {
            out.push_str("(result truncated at row cap)\n");
        }
        out
    }

    /// Render at most `limit` rows as value tuples for an LLM prompt.
    #[must_use]
    pub fn render_for_prompt(&self, limit: usize) -> String {
        if self.rows.is_empty() {
            return "No results found.".to_string();
        }
        let mut out = String::new();
        let _ = writeln!(out, "columns: ({})", self.columns.join(", "));
        for row in self.rows.iter().take(limit) {
            let values: Vec<String> = row.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "({})", values.join(", "));
        }
        if self.rows.len() > limit {
            let _ = writeln!(out, "... and {} more rows.", self.rows.len() - limit);
        }
        out
    }
}

// ──────────────────── schema & pragmas ────────────────────

fn apply_writer_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 2000;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    // Verify WAL mode is active; concurrent read-only access depends on it.
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        eprintln!("[TQH-STORE] WARNING: requested WAL mode but got '{mode}'");
    }
    Ok(())
}

fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS system_metrics (
            timestamp TIMESTAMP NOT NULL,
            hostname VARCHAR NOT NULL,
            cpu_usage DOUBLE NOT NULL,
            memory_usage DOUBLE NOT NULL,
            disk_usage DOUBLE NOT NULL,
            UNIQUE(timestamp, hostname)
        );

        CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON system_metrics(timestamp);
        CREATE INDEX IF NOT EXISTS idx_metrics_host_time ON system_metrics(hostname, timestamp);",
    )?;
    Ok(())
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn temp_store() -> (tempfile::TempDir, MetricsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::new(dir.path().join("telemetry.sqlite3"));
        store.ensure_schema().unwrap();
        (dir, store)
    }

    fn sample_at(second: u32) -> TelemetrySample {
        TelemetrySample::new(
            Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, second).unwrap(),
            "h1",
            70.0,
            48.5,
            31.2,
        )
    }

    #[test]
    fn append_then_select_star_round_trips() {
        let (_dir, store) = temp_store();
        let sample = sample_at(0);
        store.append(&sample).unwrap();

        let result = store
            .query_with_limit("SELECT * FROM system_metrics", 100)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.columns,
            vec![
                "timestamp",
                "hostname",
                "cpu_usage",
                "memory_usage",
                "disk_usage"
            ]
        );
        assert_eq!(
            result.rows[0][0],
            CellValue::Text("2026-08-06 12:00:00".to_string())
        );
        assert_eq!(result.rows[0][1], CellValue::Text("h1".to_string()));
        assert_eq!(result.rows[0][2], CellValue::Real(70.0));
    }

    #[test]
    fn schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::new(dir.path().join("telemetry.sqlite3"));
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert!(store.exists());
        assert_eq!(store.count_rows().unwrap(), 0);
    }

    #[test]
    fn duplicate_sample_is_a_distinct_error() {
        let (_dir, store) = temp_store();
        let sample = sample_at(0);
        store.append(&sample).unwrap();
        let err = store.append(&sample).unwrap_err();
        assert_eq!(err.code(), "TQH-2004");
    }

    #[test]
    fn row_cap_truncates_and_flags() {
        let (_dir, store) = temp_store();
        for second in 0..10 {
            store.append(&sample_at(second)).unwrap();
        }
        let result = store
            .query_with_limit("SELECT * FROM system_metrics ORDER BY timestamp", 4)
            .unwrap();
        assert_eq!(result.len(), 4);
        assert!(result.truncated);

        let full = store
            .query_with_limit("SELECT * FROM system_metrics", 10)
            .unwrap();
        assert_eq!(full.len(), 10);
        assert!(!full.truncated);
    }

    #[test]
    fn unknown_column_surfaces_as_query_failed_with_engine_message() {
        let (_dir, store) = temp_store();
        let err = store
            .query_with_limit("SELECT bogus_column FROM system_metrics", 10)
            .unwrap_err();
        assert_eq!(err.code(), "TQH-2003");
        assert!(
            err.to_string().contains("bogus_column"),
            "engine message should be surfaced: {err}"
        );
    }

    #[test]
    fn reader_cannot_write() {
        let (_dir, store) = temp_store();
        let err = store
            .query_with_limit("DELETE FROM system_metrics", 10)
            .unwrap_err();
        // The read-only open refuses the write at the engine level even if
        // the safety policy were bypassed.
        assert_eq!(err.code(), "TQH-2003");
    }

    #[test]
    fn exclusive_lock_maps_to_store_busy() {
        let (_dir, store) = temp_store();
        store.append(&sample_at(0)).unwrap();

        // Simulate a competing writer holding the file exclusively.
        let blocker = Connection::open(store.path()).unwrap();
        blocker.pragma_update(None, "busy_timeout", 0).unwrap();
        blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        // A second writer with a short busy_timeout loses the race.
        let err = {
            let probe = Connection::open_with_flags(
                store.path(),
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .unwrap();
            probe.pragma_update(None, "busy_timeout", 50).unwrap();
            probe
                .execute(
                    "INSERT INTO system_metrics VALUES ('2026-08-06 13:00:00','h1',1.0,1.0,1.0)",
                    [],
                )
                .unwrap_err()
        };
        let mapped: TqhError = err.into();
        assert_eq!(mapped.code(), "TQH-2001");
        assert!(mapped.is_retryable());

        blocker.execute_batch("COMMIT").unwrap();
    }

    #[test]
    fn newest_timestamp_and_count() {
        let (_dir, store) = temp_store();
        assert_eq!(store.newest_timestamp().unwrap(), None);
        for second in 0..3 {
            store.append(&sample_at(second)).unwrap();
        }
        assert_eq!(store.count_rows().unwrap(), 3);
        assert_eq!(
            store.newest_timestamp().unwrap().as_deref(),
            Some("2026-08-06 12:00:02")
        );
    }

    #[test]
    fn render_table_aligns_and_marks_truncation() {
        let (_dir, store) = temp_store();
        store.append(&sample_at(0)).unwrap();
        store.append(&sample_at(1)).unwrap();
        let result = store
            .query_with_limit("SELECT hostname, cpu_usage FROM system_metrics", 1)
            .unwrap();
        let table = result.render_table();
        assert!(table.contains("hostname"));
        assert!(table.contains("truncated"));
    }

    #[test]
    fn render_for_prompt_caps_rows() {
        let (_dir, store) = temp_store();
        for second in 0..5 {
            store.append(&sample_at(second)).unwrap();
        }
        let result = store
            .query_with_limit("SELECT * FROM system_metrics", 100)
            .unwrap();
        let prompt = result.render_for_prompt(2);
        assert!(prompt.contains("and 3 more rows"));
    }
}
