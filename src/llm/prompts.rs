//! Prompt construction for the two LLM roles: NL→SQL translation and
//! result summarization.
//!
//! The fixed schema is injected as structural context on every call, with
//! few-shot question→SQL pairs biasing the model toward it. The model is
//! never allowed to infer the schema, and its output is validated
//! structurally regardless of what these prompts ask for.

use std::fmt::Write as _;

use crate::store::sqlite::{SCHEMA_COLUMNS, TABLE_NAME};

/// Column semantics shown to the model alongside name and declared type.
const COLUMN_NOTES: [&str; 5] = [
    "The time of the metric collection, UTC, format YYYY-MM-DD HH:MM:SS.",
    "The name of the server/host.",
    "CPU utilization percentage (0-100).",
    "Memory utilization percentage (0-100).",
    "Disk utilization percentage (0-100).",
];

/// Schema description plus SQL-generation guidelines and few-shot examples.
#[must_use]
pub fn schema_guidance() -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are an AI assistant that converts natural language queries into SQL queries \
         for a SQLite database."
    );
    let _ = writeln!(
        out,
        "The database table is named '{TABLE_NAME}' and has the following columns:"
    );
    for ((name, decl), note) in SCHEMA_COLUMNS.iter().zip(COLUMN_NOTES.iter()) {
        let _ = writeln!(out, "- {name} ({decl}): {note}");
    }
    out.push_str(&format!(
        r#"
Guidelines for SQL generation:
1. Always use the table name '{TABLE_NAME}'.
2. For time-based queries use SQLite datetime arithmetic:
   - "last 24 hours": timestamp >= datetime('now', '-24 hours')
   - "last 7 days" or "last week": timestamp >= datetime('now', '-7 days')
   - "last hour": timestamp >= datetime('now', '-1 hour')
   - "past 12 hours": timestamp >= datetime('now', '-12 hours')
   - For other ranges, adapt accordingly. Stored timestamps are UTC.
3. Map natural language metrics to column names:
   - "CPU" or "cpu usage" -> cpu_usage
   - "memory" or "memory usage" -> memory_usage
   - "disk" or "disk usage" -> disk_usage
4. For threshold queries (e.g. "memory usage > 65%"), use the matching column
   and comparison operator. Values are percentages: "65%" means 65.
5. SELECT all columns (SELECT *) or the relevant ones such as
   hostname, timestamp, cpu_usage. If the question asks about "servers" or
   "hosts", make sure hostname is selected.
6. Only ever produce a single SELECT statement. Never modify data.

Example question: "Show me servers that crossed 65% memory usage in the past 24 hours."
Example SQL: SELECT DISTINCT hostname, timestamp, memory_usage FROM {TABLE_NAME} WHERE memory_usage > 65 AND timestamp >= datetime('now', '-24 hours') ORDER BY timestamp DESC;

Example question: "Did any host spike over 85% CPU last week?"
Example SQL: SELECT hostname, timestamp, cpu_usage FROM {TABLE_NAME} WHERE cpu_usage > 85 AND timestamp >= datetime('now', '-7 days') ORDER BY timestamp DESC LIMIT 10;

Example question: "List hosts with >90% disk usage in the past 12 hours"
Example SQL: SELECT DISTINCT hostname, timestamp, disk_usage FROM {TABLE_NAME} WHERE disk_usage > 90 AND timestamp >= datetime('now', '-12 hours') ORDER BY hostname, timestamp DESC;

Only output the SQL query. Do not add any other text, explanation, or markdown formatting.
"#
    ));
    out
}

/// Full translation prompt for one question.
#[must_use]
pub fn translation_prompt(question: &str) -> String {
    format!(
        "{}\nNatural Language Query: {question}\nSQL Query:",
        schema_guidance()
    )
}

/// Summarization prompt: question, the SQL that ran, and a bounded row
/// rendering.
#[must_use]
pub fn summary_prompt(question: &str, sql: &str, rows_rendered: &str) -> String {
    format!(
        r#"You are an AI assistant that summarizes database query results in a human-readable way.
Original Natural Language Query: {question}
Generated SQL Query: {sql}
SQL Query Results:
{rows_rendered}

Based on the query and results, provide a concise, natural language summary.
If there are many results, summarize the key findings rather than listing everything.
Only describe values that appear in the results above; never invent numbers.
Focus on answering the original question.

Summary:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guidance_names_schema_and_dialect() {
        let guidance = schema_guidance();
        assert!(guidance.contains(TABLE_NAME));
        for (name, _) in SCHEMA_COLUMNS {
            assert!(guidance.contains(name), "column {name} missing");
        }
        // Time windows must be in the store's dialect, not someone else's.
        assert!(guidance.contains("datetime('now', '-1 hour')"));
        assert!(!guidance.contains("INTERVAL"));
    }

    #[test]
    fn translation_prompt_embeds_question() {
        let prompt = translation_prompt("Which hosts ran hot?");
        assert!(prompt.contains("Which hosts ran hot?"));
        assert!(prompt.ends_with("SQL Query:"));
    }

    #[test]
    fn summary_prompt_embeds_all_parts() {
        let prompt = summary_prompt("q?", "SELECT 1", "(1)");
        assert!(prompt.contains("q?"));
        assert!(prompt.contains("SELECT 1"));
        assert!(prompt.contains("(1)"));
        assert!(prompt.contains("never invent numbers"));
    }
}
