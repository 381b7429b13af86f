//! Metric collector: periodic sampling loop feeding the telemetry store.

pub mod loop_main;
pub mod sampler;
#[cfg(feature = "collector")]
pub mod signals;

pub use loop_main::{CollectorHandle, CollectorOptions, spawn_collector};
pub use sampler::{FixedSource, MetricsReading, MetricsSource};
#[cfg(feature = "collector")]
pub use sampler::{SystemSampler, default_hostname};
