//! TQH-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, TqhError>;

/// Top-level error type for Telemetry Query Helper.
#[derive(Debug, Error)]
pub enum TqhError {
    #[error("[TQH-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[TQH-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[TQH-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[TQH-2001] store busy: {details}")]
    StoreBusy { details: String },

    #[error("[TQH-2002] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[TQH-2003] query failed: {details}")]
    QueryFailed { details: String },

    #[error("[TQH-2004] duplicate sample for {hostname} at {timestamp}")]
    DuplicateSample {
        hostname: String,
        timestamp: String,
    },

    #[error("[TQH-3001] could not translate question into a data query: {details}")]
    TranslationFailed { details: String },

    #[error("[TQH-3002] unsafe query rejected: {details}")]
    UnsafeQuery { details: String },

    #[error("[TQH-3003] summary unavailable: {details}")]
    SummaryUnavailable { details: String },

    #[error("[TQH-3004] LLM endpoint unreachable in {context}: {details}")]
    LlmUnreachable {
        context: &'static str,
        details: String,
    },

    #[error("[TQH-3005] request cancelled at stage {stage}")]
    Cancelled { stage: &'static str },

    #[error("[TQH-4001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[TQH-4002] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[TQH-4003] runtime failure: {details}")]
    Runtime { details: String },
}

impl TqhError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "TQH-1001",
            Self::MissingConfig { .. } => "TQH-1002",
            Self::ConfigParse { .. } => "TQH-1003",
            Self::StoreBusy { .. } => "TQH-2001",
            Self::Sql { .. } => "TQH-2002",
            Self::QueryFailed { .. } => "TQH-2003",
            Self::DuplicateSample { .. } => "TQH-2004",
            Self::TranslationFailed { .. } => "TQH-3001",
            Self::UnsafeQuery { .. } => "TQH-3002",
            Self::SummaryUnavailable { .. } => "TQH-3003",
            Self::LlmUnreachable { .. } => "TQH-3004",
            Self::Cancelled { .. } => "TQH-3005",
            Self::Io { .. } => "TQH-4001",
            Self::Serialization { .. } => "TQH-4002",
            Self::Runtime { .. } => "TQH-4003",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// `StoreBusy` is the canonical transient condition: writer commits are
    /// short, so a second attempt after a small backoff usually succeeds.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreBusy { .. } | Self::LlmUnreachable { .. } | Self::Io { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<rusqlite::Error> for TqhError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, ref msg) = value {
            if matches!(
                ffi_err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Self::StoreBusy {
                    details: msg.clone().unwrap_or_else(|| ffi_err.to_string()),
                };
            }
        }
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for TqhError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for TqhError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<ureq::Error> for TqhError {
    fn from(value: ureq::Error) -> Self {
        Self::LlmUnreachable {
            context: "http",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<TqhError> {
        vec![
            TqhError::InvalidConfig {
                details: String::new(),
            },
            TqhError::MissingConfig {
                path: PathBuf::new(),
            },
            TqhError::ConfigParse {
                context: "",
                details: String::new(),
            },
            TqhError::StoreBusy {
                details: String::new(),
            },
            TqhError::Sql {
                context: "",
                details: String::new(),
            },
            TqhError::QueryFailed {
                details: String::new(),
            },
            TqhError::DuplicateSample {
                hostname: String::new(),
                timestamp: String::new(),
            },
            TqhError::TranslationFailed {
                details: String::new(),
            },
            TqhError::UnsafeQuery {
                details: String::new(),
            },
            TqhError::SummaryUnavailable {
                details: String::new(),
            },
            TqhError::LlmUnreachable {
                context: "",
                details: String::new(),
            },
            TqhError::Cancelled { stage: "" },
            TqhError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            TqhError::Serialization {
                context: "",
                details: String::new(),
            },
            TqhError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let codes: Vec<&str> = all_variants().iter().map(TqhError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_tqh_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("TQH-"),
                "code {} must start with TQH-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = TqhError::UnsafeQuery {
            details: "contains DROP".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("TQH-3002"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("contains DROP"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            TqhError::StoreBusy {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            TqhError::LlmUnreachable {
                context: "http",
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            TqhError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            }
            .is_retryable()
        );

        assert!(
            !TqhError::TranslationFailed {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !TqhError::UnsafeQuery {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !TqhError::QueryFailed {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(!TqhError::Cancelled { stage: "executing" }.is_retryable());
    }

    #[test]
    fn busy_sqlite_failures_map_to_store_busy() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err: TqhError = busy.into();
        assert_eq!(err.code(), "TQH-2001");
        assert!(err.is_retryable());
    }

    #[test]
    fn other_sqlite_failures_map_to_sql() {
        let misuse = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some("no such column: cpu".to_string()),
        );
        let err: TqhError = misuse.into();
        assert_eq!(err.code(), "TQH-2002");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: TqhError = json_err.into();
        assert_eq!(err.code(), "TQH-4002");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: TqhError = toml_err.into();
        assert_eq!(err.code(), "TQH-1003");
    }
}
