#![forbid(unsafe_code)]

//! Telemetry Query Helper (tqh) — natural-language questions over local host
//! telemetry.
//!
//! Two halves share one embedded store file:
//! 1. **Collector** — samples CPU/memory/disk percentages on an interval and
//!    appends one row per cycle through a short-lived write connection
//! 2. **Query pipeline** — translates a question to SQL via a local LLM,
//!    validates it against a hard safety policy, executes it read-only, and
//!    summarizes the rows back into prose
//!
//! There is no server arbitrating access: safety comes from WAL mode plus
//! connection discipline (open, operate, close — writer and readers alike).
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use telemetry_query_helper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use telemetry_query_helper::core::config::Config;
//! use telemetry_query_helper::store::sqlite::MetricsStore;
//! ```

pub mod prelude;

pub mod collector;
pub mod core;
pub mod llm;
pub mod logger;
pub mod query;
pub mod store;
