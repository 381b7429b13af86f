//! OS metric sources: what fraction of CPU, memory, and disk is in use.

#![allow(missing_docs)]

use crate::core::errors::Result;

/// One reading of the three usage percentages. Values are clamped to
/// `[0, 100]` by the sample constructor before they reach the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsReading {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub disk_pct: f64,
}

/// A source of current usage percentages.
///
/// The OS is an external collaborator here; the collector only needs
/// something callable that yields the three numbers. Tests substitute a
/// fixed source.
pub trait MetricsSource: Send {
    fn sample(&mut self) -> Result<MetricsReading>;
}

/// Constant-valued source for tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub MetricsReading);

impl MetricsSource for FixedSource {
    fn sample(&mut self) -> Result<MetricsReading> {
        Ok(self.0)
    }
}

// ──────────────────── sysinfo-backed source ────────────────────

#[cfg(feature = "collector")]
pub use system::{SystemSampler, default_hostname};

#[cfg(feature = "collector")]
mod system {
    use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

    use super::{MetricsReading, MetricsSource};
    use crate::core::errors::Result;

    /// Live system sampler. Keeps a reusable `sysinfo::System` instance so
    /// successive CPU readings have a baseline to diff against.
    pub struct SystemSampler {
        sys: System,
        disks: Disks,
    }

    impl SystemSampler {
        /// Preload CPU and memory state. The initial refresh establishes the
        /// CPU baseline; the first interval's reading is already meaningful.
        #[must_use]
        pub fn new() -> Self {
            let mut sys = System::new_with_specifics(
                RefreshKind::new()
                    .with_cpu(CpuRefreshKind::everything())
                    .with_memory(MemoryRefreshKind::everything()),
            );
            sys.refresh_cpu_usage();
            sys.refresh_memory();

            let disks = Disks::new_with_refreshed_list();

            Self { sys, disks }
        }
    }

    impl Default for SystemSampler {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MetricsSource for SystemSampler {
        fn sample(&mut self) -> Result<MetricsReading> {
            self.sys.refresh_cpu_usage();
            self.sys.refresh_memory();
            self.disks.refresh();

            let cpu_pct = f64::from(self.sys.global_cpu_info().cpu_usage());

            let total_mem = self.sys.total_memory();
            let memory_pct = if total_mem == 0 {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let pct = self.sys.used_memory() as f64 / total_mem as f64 * 100.0;
                pct
            };

            let (used_bytes, total_bytes) =
                self.disks
                    .list()
                    .iter()
                    .fold((0u128, 0u128), |(used, total), disk| {
                        let total_space = u128::from(disk.total_space());
                        let available = u128::from(disk.available_space());
                        (
                            used + total_space.saturating_sub(available),
                            total + total_space,
                        )
                    });
            let disk_pct = if total_bytes == 0 {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let pct = used_bytes as f64 / total_bytes as f64 * 100.0;
                pct
            };

            Ok(MetricsReading {
                cpu_pct,
                memory_pct,
                disk_pct,
            })
        }
    }

    /// The OS host name, falling back to `"localhost"` when unavailable.
    #[must_use]
    pub fn default_hostname() -> String {
        System::host_name()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}
