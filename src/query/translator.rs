//! NL→SQL translation: prompt the model with the fixed schema, then refuse
//! to trust the reply until it looks like a single SELECT over our table.

use std::sync::Arc;

use crate::core::errors::{Result, TqhError};
use crate::llm::client::Llm;
use crate::llm::prompts;
use crate::store::sqlite::TABLE_NAME;

/// Translates one natural-language question into one SQL statement.
pub struct QueryTranslator {
    llm: Arc<dyn Llm>,
}

impl QueryTranslator {
    #[must_use]
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Translate `question` into SQL text.
    ///
    /// Model output is not deterministic; the same question may translate
    /// differently across calls. Structural checks here — non-empty, single
    /// SELECT, references our table — catch malformed output. Unknown
    /// *columns* are left for the engine to reject at execution time, which
    /// surfaces them with a precise message.
    pub fn translate(&self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TqhError::TranslationFailed {
                details: "question is empty".to_string(),
            });
        }

        let raw = self
            .llm
            .generate(&prompts::translation_prompt(question))
            .map_err(|error| match error {
                TqhError::LlmUnreachable { details, .. } => TqhError::TranslationFailed {
                    details: format!("LLM unavailable: {details}"),
                },
                other => other,
            })?;

        let sql = clean_output(&raw);
        if sql.is_empty() {
            return Err(TqhError::TranslationFailed {
                details: "model returned no SQL".to_string(),
            });
        }
        if !sql.to_ascii_lowercase().starts_with("select") {
            return Err(TqhError::TranslationFailed {
                details: format!("model output is not a SELECT statement: {sql}"),
            });
        }
        if !sql.to_ascii_lowercase().contains(TABLE_NAME) {
            return Err(TqhError::TranslationFailed {
                details: format!("statement does not reference the {TABLE_NAME} table"),
            });
        }

        Ok(sql)
    }
}

/// Strip markdown fences and surrounding noise from raw model output.
#[must_use]
pub fn clean_output(raw: &str) -> String {
    raw.replace("```sql", "")
        .replace("```", "")
        .trim()
        .to_string()
}
