//! Embedded telemetry store: one writer, many read-only readers, no server.

pub mod sample;
pub mod sqlite;

pub use sample::{TelemetrySample, format_timestamp};
pub use sqlite::{CellValue, MetricsStore, ResultSet, TABLE_NAME};
