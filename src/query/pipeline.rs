//! Orchestrator: drives one question through
//! Received → Translating → Validating → Executing → Summarizing → Answered.
//!
//! Every stage boundary is a cancellation point and an event-log line. Any
//! stage can fail into a typed error; summarization failure alone degrades
//! instead — the caller still gets the SQL and the raw rows.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::config::Config;
use crate::core::errors::{Result, TqhError};
use crate::llm::client::Llm;
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::query::executor::QueryExecutor;
use crate::query::summarizer::ResultSummarizer;
use crate::query::translator::QueryTranslator;
use crate::query::validator::SqlPolicy;
use crate::store::sqlite::{MetricsStore, ResultSet};

/// Pipeline stages, in order. Used for event logging and cancellation
/// reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Translating,
    Validating,
    Executing,
    Summarizing,
    Answered,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Translating => "translating",
            Self::Validating => "validating",
            Self::Executing => "executing",
            Self::Summarizing => "summarizing",
            Self::Answered => "answered",
        }
    }
}

/// Caller-held cancellation flag, checked at every stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The outcome of one question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Correlation id, monotonically increasing per pipeline instance.
    pub request_id: u64,
    /// The question as received.
    pub question: String,
    /// The SQL that was executed.
    pub sql: String,
    /// The raw result rows.
    pub rows: ResultSet,
    /// Prose summary; `None` when summarization degraded.
    pub summary: Option<String>,
}

impl Answer {
    /// True when the summarizer was unavailable and only raw rows came back.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.summary.is_none()
    }

    /// Caller-facing text: the summary, or the raw table in degraded mode.
    #[must_use]
    pub fn display_text(&self) -> String {
        self.summary.clone().map_or_else(
            || {
                format!(
                    "Couldn't generate a summary; here is the raw data.\n\n{}",
                    self.rows.render_table()
                )
            },
            |summary| summary,
        )
    }
}

/// One pipeline instance, safe to share across threads; concurrent `ask`
/// calls only contend on the atomic request counter and the event log mutex.
pub struct AskPipeline {
    translator: QueryTranslator,
    executor: QueryExecutor,
    summarizer: ResultSummarizer,
    policy: SqlPolicy,
    events: Mutex<JsonlWriter>,
    busy_retry: Duration,
    next_request_id: AtomicU64,
}

impl AskPipeline {
    /// Wire the pipeline from config. Creates the store file and schema if
    /// absent so an empty store answers "no data" instead of erroring.
    pub fn new(config: &Config, llm: Arc<dyn Llm>) -> Result<Self> {
        let store = MetricsStore::new(&config.paths.db_file);
        store.ensure_schema()?;

        Ok(Self {
            translator: QueryTranslator::new(Arc::clone(&llm)),
            executor: QueryExecutor::new(store, config.query.max_result_rows),
            summarizer: ResultSummarizer::new(llm, config.query.prompt_row_limit),
            policy: SqlPolicy::new(),
            events: Mutex::new(JsonlWriter::open(JsonlConfig::at(&config.paths.jsonl_log))),
            busy_retry: Duration::from_millis(config.query.busy_retry_ms),
            next_request_id: AtomicU64::new(0),
        })
    }

    /// Answer one question, or fail with a typed error.
    pub fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_cancellable(question, &CancelToken::new())
    }

    /// Answer one question, checking `cancel` at every stage boundary.
    pub fn ask_cancellable(&self, question: &str, cancel: &CancelToken) -> Result<Answer> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();

        let mut received = LogEntry::new(EventType::QueryReceived, Severity::Info);
        received.request_id = Some(request_id);
        received.question = Some(question.to_string());
        self.log(received);

        let outcome = self.run(request_id, question, cancel, started);
        if let Err(error) = &outcome {
            let mut entry = LogEntry::new(EventType::Error, Severity::Warning);
            entry.request_id = Some(request_id);
            entry.error_code = Some(error.code().to_string());
            entry.error_message = Some(error.to_string());
            self.log(entry);
        }
        outcome
    }

    /// The store the pipeline reads from.
    #[must_use]
    pub fn store(&self) -> &MetricsStore {
        self.executor.store()
    }

    fn run(
        &self,
        request_id: u64,
        question: &str,
        cancel: &CancelToken,
        started: Instant,
    ) -> Result<Answer> {
        ensure_live(cancel, Stage::Translating)?;
        let sql = self.translator.translate(question)?;
        let mut generated = LogEntry::new(EventType::SqlGenerated, Severity::Info);
        generated.request_id = Some(request_id);
        generated.sql = Some(sql.clone());
        self.log(generated);

        ensure_live(cancel, Stage::Validating)?;
        if let Err(error) = self.policy.validate(&sql) {
            let mut rejected = LogEntry::new(EventType::QueryRejected, Severity::Warning);
            rejected.request_id = Some(request_id);
            rejected.sql = Some(sql);
            rejected.error_code = Some(error.code().to_string());
            rejected.error_message = Some(error.to_string());
            self.log(rejected);
            return Err(error);
        }

        ensure_live(cancel, Stage::Executing)?;
        let exec_started = Instant::now();
        let rows = match self.executor.execute(&sql) {
            Err(TqhError::StoreBusy { .. }) => {
                // Writer commits are short; retry once after a jittered delay.
                std::thread::sleep(jittered(self.busy_retry));
                self.executor.execute(&sql)?
            }
            other => other?,
        };
        let mut executed = LogEntry::new(EventType::QueryExecuted, Severity::Info);
        executed.request_id = Some(request_id);
        executed.rows = Some(rows.len() as u64);
        executed.duration_ms = Some(duration_ms(exec_started));
        self.log(executed);

        ensure_live(cancel, Stage::Summarizing)?;
        let summary = match self.summarizer.summarize(question, &sql, &rows) {
            Ok(text) => Some(text),
            Err(TqhError::SummaryUnavailable { details }) => {
                let mut degraded = LogEntry::new(EventType::SummaryDegraded, Severity::Warning);
                degraded.request_id = Some(request_id);
                degraded.details = Some(details);
                self.log(degraded);
                None
            }
            Err(other) => return Err(other),
        };

        let mut answered = LogEntry::new(EventType::Answered, Severity::Info);
        answered.request_id = Some(request_id);
        answered.rows = Some(rows.len() as u64);
        answered.duration_ms = Some(duration_ms(started));
        self.log(answered);

        Ok(Answer {
            request_id,
            question: question.to_string(),
            sql,
            rows,
            summary,
        })
    }

    fn log(&self, entry: LogEntry) {
        self.events.lock().write_entry(&entry);
    }
}

fn ensure_live(cancel: &CancelToken, stage: Stage) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(TqhError::Cancelled {
            stage: stage.as_str(),
        });
    }
    Ok(())
}

fn jittered(base: Duration) -> Duration {
    use rand::Rng;
    base + Duration::from_millis(rand::rng().random_range(0..=50))
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
