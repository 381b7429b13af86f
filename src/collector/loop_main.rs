//! The writer loop: one sample per interval, one short-lived connection per
//! append, and no way for a single bad cycle to kill the loop.
//!
//! The loop paces itself by waiting on the shutdown channel with a timeout,
//! so a stop request interrupts the idle sleep immediately instead of
//! waiting out the interval.

#![allow(missing_docs)]

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

use crate::collector::sampler::MetricsSource;
use crate::core::errors::{Result, TqhError};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::store::sample::TelemetrySample;
use crate::store::sqlite::MetricsStore;

/// Tuning for one collector run.
#[derive(Debug, Clone)]
pub struct CollectorOptions {
    /// Time between samples.
    pub interval: Duration,
    /// Hostname recorded on every row.
    pub hostname: String,
    /// Delay before the single retry after a busy store.
    pub busy_retry: Duration,
}

/// Handle to a running collector thread. Dropping it stops the loop.
pub struct CollectorHandle {
    shutdown_tx: Sender<()>,
    join: Option<JoinHandle<()>>,
}

impl CollectorHandle {
    /// Request shutdown and wait for the loop to finish its current cycle.
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Spawn the sampling loop on its own thread.
///
/// The loop appends via short-lived connections and never holds one across
/// the idle sleep; readers are free to query at any point. Per-cycle
/// failures are logged and the loop continues — data loss for one cycle is
/// acceptable, loop death is not.
pub fn spawn_collector(
    store: MetricsStore,
    source: Box<dyn MetricsSource>,
    options: CollectorOptions,
    events: JsonlWriter,
) -> Result<CollectorHandle> {
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let join = thread::Builder::new()
        .name("tqh-collector".to_string())
        .spawn(move || run_loop(&store, source, &options, events, &shutdown_rx))
        .map_err(|source| TqhError::Runtime {
            details: format!("failed to spawn collector thread: {source}"),
        })?;

    Ok(CollectorHandle {
        shutdown_tx,
        join: Some(join),
    })
}

fn run_loop(
    store: &MetricsStore,
    mut source: Box<dyn MetricsSource>,
    options: &CollectorOptions,
    mut events: JsonlWriter,
    shutdown_rx: &Receiver<()>,
) {
    if let Err(error) = store.ensure_schema() {
        let mut entry = LogEntry::new(EventType::Error, Severity::Critical);
        entry.error_code = Some(error.code().to_string());
        entry.error_message = Some(error.to_string());
        events.write_entry(&entry);
        eprintln!("[TQH-COLLECTOR] cannot initialize store: {error}");
        return;
    }

    let mut start = LogEntry::new(EventType::CollectorStart, Severity::Info);
    start.host = Some(options.hostname.clone());
    start.details = Some(format!("interval={}s", options.interval.as_secs()));
    events.write_entry(&start);
    events.flush();

    let mut last_timestamp: Option<DateTime<Utc>> = None;

    loop {
        let cycle_started = Instant::now();

        match source.sample() {
            Ok(reading) => {
                let timestamp = next_timestamp(Utc::now(), last_timestamp);
                last_timestamp = Some(timestamp);
                let sample = TelemetrySample::new(
                    timestamp,
                    options.hostname.clone(),
                    reading.cpu_pct,
                    reading.memory_pct,
                    reading.disk_pct,
                );
                append_with_retry(store, &sample, options.busy_retry, &mut events);
            }
            Err(error) => {
                let mut entry = LogEntry::new(EventType::Error, Severity::Warning);
                entry.host = Some(options.hostname.clone());
                entry.error_code = Some(error.code().to_string());
                entry.error_message = Some(error.to_string());
                events.write_entry(&entry);
            }
        }

        let elapsed = cycle_started.elapsed();
        let wait = options.interval.saturating_sub(elapsed);
        match shutdown_rx.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    let mut stop = LogEntry::new(EventType::CollectorStop, Severity::Info);
    stop.host = Some(options.hostname.clone());
    events.write_entry(&stop);
    events.flush();
}

/// Writer-enforced timestamp ordering: each cycle's timestamp is at least
/// one second (the storage granularity) past the previous one.
fn next_timestamp(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + ChronoDuration::seconds(1),
        _ => now,
    }
}

fn append_with_retry(
    store: &MetricsStore,
    sample: &TelemetrySample,
    busy_retry: Duration,
    events: &mut JsonlWriter,
) {
    match store.append(sample) {
        Ok(()) => log_appended(events, sample, false),
        Err(TqhError::DuplicateSample { .. }) => {
            log_dropped(events, sample, "duplicate (timestamp, hostname); skipped");
        }
        Err(TqhError::StoreBusy { .. }) => {
            thread::sleep(jittered(busy_retry));
            match store.append(sample) {
                Ok(()) => log_appended(events, sample, true),
                Err(error) => log_dropped(events, sample, &error.to_string()),
            }
        }
        Err(error) => log_dropped(events, sample, &error.to_string()),
    }
}

fn log_appended(events: &mut JsonlWriter, sample: &TelemetrySample, retried: bool) {
    let mut entry = LogEntry::new(EventType::SampleAppended, Severity::Info);
    entry.host = Some(sample.hostname.clone());
    entry.details = Some(format!(
        "cpu={:.1} mem={:.1} disk={:.1}{}",
        sample.cpu_usage,
        sample.memory_usage,
        sample.disk_usage,
        if retried { " (after retry)" } else { "" }
    ));
    events.write_entry(&entry);
}

fn log_dropped(events: &mut JsonlWriter, sample: &TelemetrySample, reason: &str) {
    let mut entry = LogEntry::new(EventType::SampleDropped, Severity::Warning);
    entry.host = Some(sample.hostname.clone());
    entry.details = Some(reason.to_string());
    events.write_entry(&entry);
}

fn jittered(base: Duration) -> Duration {
    use rand::Rng;
    base + Duration::from_millis(rand::rng().random_range(0..=50))
}
