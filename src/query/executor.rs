//! Validated read-only execution against the store with a bounded result.

use crate::core::errors::Result;
use crate::query::validator::SqlPolicy;
use crate::store::sqlite::{MetricsStore, ResultSet};

/// Runs one statement read-only and caps the collected rows.
///
/// The executor re-validates every statement it is handed, even though the
/// orchestrator has its own validation stage: no code path may carry
/// unchecked SQL to the store.
pub struct QueryExecutor {
    store: MetricsStore,
    policy: SqlPolicy,
    max_rows: usize,
}

impl QueryExecutor {
    #[must_use]
    pub fn new(store: MetricsStore, max_rows: usize) -> Self {
        Self {
            store,
            policy: SqlPolicy::new(),
            max_rows,
        }
    }

    /// Execute `sql` read-only. Returns `UnsafeQuery` without touching the
    /// store if the policy rejects it; `QueryFailed` carries the engine's
    /// message for statements that parse but fail; `StoreBusy` passes
    /// through untouched so the caller can retry.
    pub fn execute(&self, sql: &str) -> Result<ResultSet> {
        self.policy.validate(sql)?;
        self.store.query_with_limit(sql, self.max_rows)
    }

    /// The store this executor reads from.
    #[must_use]
    pub fn store(&self) -> &MetricsStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sample::TelemetrySample;
    use chrono::{TimeZone, Utc};

    fn seeded_executor(max_rows: usize) -> (tempfile::TempDir, QueryExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::new(dir.path().join("telemetry.sqlite3"));
        store.ensure_schema().unwrap();
        for (second, cpu) in [(0, 70.0), (10, 90.0), (20, 50.0)] {
            store
                .append(&TelemetrySample::new(
                    Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, second).unwrap(),
                    "h1",
                    cpu,
                    40.0,
                    30.0,
                ))
                .unwrap();
        }
        (dir, QueryExecutor::new(store, max_rows))
    }

    #[test]
    fn executes_filtered_select() {
        let (_dir, executor) = seeded_executor(1000);
        let rows = executor
            .execute("SELECT hostname, cpu_usage FROM system_metrics WHERE cpu_usage > 65")
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn rejects_unsafe_sql_without_executing() {
        let (_dir, executor) = seeded_executor(1000);
        let err = executor.execute("DROP TABLE system_metrics").unwrap_err();
        assert_eq!(err.code(), "TQH-3002");
        // Table must still be intact.
        assert_eq!(executor.store().count_rows().unwrap(), 3);
    }

    #[test]
    fn caps_result_rows() {
        let (_dir, executor) = seeded_executor(2);
        let rows = executor.execute("SELECT * FROM system_metrics").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.truncated);
    }

    #[test]
    fn surfaces_engine_error_as_query_failed() {
        let (_dir, executor) = seeded_executor(1000);
        let err = executor
            .execute("SELECT nonexistent FROM system_metrics")
            .unwrap_err();
        assert_eq!(err.code(), "TQH-2003");
    }
}
