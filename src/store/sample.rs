//! The one row type of the telemetry table.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};

/// One telemetry row: a point-in-time snapshot of host resource usage.
///
/// Rows are immutable once written; there is no update or delete path.
/// Usage values are percentages in `[0, 100]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub hostname: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
}

impl TelemetrySample {
    /// Build a sample, clamping usage values into `[0, 100]`.
    ///
    /// NaN clamps to 0 — a sampler glitch must not poison the table.
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        hostname: impl Into<String>,
        cpu_usage: f64,
        memory_usage: f64,
        disk_usage: f64,
    ) -> Self {
        Self {
            timestamp,
            hostname: hostname.into(),
            cpu_usage: clamp_pct(cpu_usage),
            memory_usage: clamp_pct(memory_usage),
            disk_usage: clamp_pct(disk_usage),
        }
    }

    /// Timestamp in the store's text encoding.
    #[must_use]
    pub fn timestamp_text(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Encode a UTC instant as `YYYY-MM-DD HH:MM:SS`.
///
/// This matches SQLite's `datetime('now', …)` output, so lexicographic
/// comparison of stored timestamps against generated time-window expressions
/// is correct.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn clamp_pct(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
