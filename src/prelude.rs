//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use telemetry_query_helper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TqhError};

// Store
pub use crate::store::sample::TelemetrySample;
pub use crate::store::sqlite::{CellValue, MetricsStore, ResultSet, TABLE_NAME};

// Collector
pub use crate::collector::loop_main::{CollectorHandle, CollectorOptions, spawn_collector};
pub use crate::collector::sampler::{FixedSource, MetricsReading, MetricsSource};
#[cfg(feature = "collector")]
pub use crate::collector::sampler::{SystemSampler, default_hostname};

// LLM
pub use crate::llm::client::{Llm, OllamaClient, ScriptedLlm};

// Query pipeline
pub use crate::query::executor::QueryExecutor;
pub use crate::query::pipeline::{Answer, AskPipeline, CancelToken, Stage};
pub use crate::query::summarizer::ResultSummarizer;
pub use crate::query::translator::QueryTranslator;
pub use crate::query::validator::SqlPolicy;
