//! Turn a tabular result back into prose — without ever inventing data.

use std::sync::Arc;

use crate::core::errors::{Result, TqhError};
use crate::llm::client::Llm;
use crate::llm::prompts;
use crate::store::sqlite::ResultSet;

/// Fixed answer for empty results. Produced without consulting the model:
/// an LLM handed an empty table has a known tendency to fabricate plausible
/// numbers, so the empty case never reaches it.
pub const NO_DATA_ANSWER: &str = "No data was found in the telemetry store for that query.";

/// Summarizes query results against the original question.
pub struct ResultSummarizer {
    llm: Arc<dyn Llm>,
    prompt_row_limit: usize,
}

impl ResultSummarizer {
    #[must_use]
    pub fn new(llm: Arc<dyn Llm>, prompt_row_limit: usize) -> Self {
        Self {
            llm,
            prompt_row_limit,
        }
    }

    /// Produce a prose answer for `rows`.
    ///
    /// Empty results short-circuit to [`NO_DATA_ANSWER`]. LLM transport
    /// failure maps to `SummaryUnavailable` so the orchestrator can degrade
    /// to returning the raw rows.
    pub fn summarize(&self, question: &str, sql: &str, rows: &ResultSet) -> Result<String> {
        if rows.is_empty() {
            return Ok(NO_DATA_ANSWER.to_string());
        }

        let rendered = rows.render_for_prompt(self.prompt_row_limit);
        let raw = self
            .llm
            .generate(&prompts::summary_prompt(question, sql, &rendered))
            .map_err(|error| match error {
                TqhError::LlmUnreachable { details, .. } => TqhError::SummaryUnavailable {
                    details: format!("LLM unavailable: {details}"),
                },
                other => other,
            })?;

        let summary = raw.trim();
        if summary.is_empty() {
            return Err(TqhError::SummaryUnavailable {
                details: "model returned an empty summary".to_string(),
            });
        }
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::ScriptedLlm;
    use crate::store::sqlite::CellValue;

    fn rows(count: usize) -> ResultSet {
        ResultSet {
            columns: vec!["hostname".to_string(), "cpu_usage".to_string()],
            rows: (0..count)
                .map(|i| {
                    vec![
                        CellValue::Text("h1".to_string()),
                        CellValue::Real(70.0 + i as f64),
                    ]
                })
                .collect(),
            truncated: false,
        }
    }

    #[test]
    fn empty_result_never_reaches_the_model() {
        let llm = Arc::new(ScriptedLlm::new(["should never be used"]));
        let summarizer = ResultSummarizer::new(Arc::clone(&llm) as Arc<dyn Llm>, 20);
        let answer = summarizer
            .summarize("anything?", "SELECT 1", &rows(0))
            .unwrap();
        assert_eq!(answer, NO_DATA_ANSWER);
        assert_eq!(llm.call_count(), 0, "empty input must not invoke the LLM");
    }

    #[test]
    fn summary_prompt_carries_bounded_rows() {
        let llm = Arc::new(ScriptedLlm::new(["Host h1 peaked at 90% CPU."]));
        let summarizer = ResultSummarizer::new(Arc::clone(&llm) as Arc<dyn Llm>, 2);
        let answer = summarizer
            .summarize("which hosts ran hot?", "SELECT ...", &rows(5))
            .unwrap();
        assert_eq!(answer, "Host h1 peaked at 90% CPU.");
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("which hosts ran hot?"));
        assert!(prompt.contains("and 3 more rows"));
    }

    #[test]
    fn dead_endpoint_maps_to_summary_unavailable() {
        let summarizer = ResultSummarizer::new(Arc::new(ScriptedLlm::default()), 20);
        let err = summarizer
            .summarize("q?", "SELECT 1", &rows(1))
            .unwrap_err();
        assert_eq!(err.code(), "TQH-3003");
    }

    #[test]
    fn blank_summary_is_unavailable() {
        let summarizer = ResultSummarizer::new(Arc::new(ScriptedLlm::new(["   \n"])), 20);
        let err = summarizer
            .summarize("q?", "SELECT 1", &rows(1))
            .unwrap_err();
        assert_eq!(err.code(), "TQH-3003");
    }
}
