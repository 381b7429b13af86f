//! SQL safety policy: hard allow/deny gate between the model and the store.
//!
//! The LLM is untrusted input. Whatever it produced, only a single read-only
//! SELECT may reach the executor. The checks here are deliberately
//! conservative: rejecting an occasional legitimate statement is acceptable,
//! executing a destructive one is not. The read-only connection mode is the
//! second, independent line of defense.

use regex::Regex;

use crate::core::errors::{Result, TqhError};

/// Keywords that disqualify a statement outright, matched case-insensitively
/// on word boundaries. Covers the standard write/DDL set plus SQLite's own
/// write-capable verbs.
pub const DENIED_KEYWORDS: [&str; 11] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "ATTACH", "PRAGMA", "REPLACE",
    "VACUUM", "REINDEX",
];

/// Compiled deny-list policy. Build once, validate many.
pub struct SqlPolicy {
    deny: Regex,
}

impl SqlPolicy {
    #[must_use]
    pub fn new() -> Self {
        let pattern = format!(r"(?i)\b({})\b", DENIED_KEYWORDS.join("|"));
        Self {
            deny: Regex::new(&pattern).expect("deny-list pattern is a valid literal"),
        }
    }

    /// Check a statement against the policy. `Err(UnsafeQuery)` means the
    /// statement must never be executed.
    pub fn validate(&self, sql: &str) -> Result<()> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(TqhError::UnsafeQuery {
                details: "empty statement".to_string(),
            });
        }

        // One statement only: nothing but whitespace may follow the first
        // terminator. A semicolon inside a string literal false-positives
        // here; that trade is taken knowingly.
        if let Some(semi) = trimmed.find(';') {
            let tail = &trimmed[semi + 1..];
            if !tail.trim().is_empty() {
                return Err(TqhError::UnsafeQuery {
                    details: "multiple statements".to_string(),
                });
            }
        }

        if let Some(found) = self.deny.find(trimmed) {
            return Err(TqhError::UnsafeQuery {
                details: format!("disallowed keyword '{}'", found.as_str().to_uppercase()),
            });
        }

        Ok(())
    }
}

impl Default for SqlPolicy {
    fn default() -> Self {
        Self::new()
    }
}
