use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to persist settings to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Target not ready: {0}")]
    TargetNotReady(String),

    #[error("Cannot install request filter on session '{partition}': {reason}")]
    FilterRegistration { partition: String, reason: String },

    #[error("Invalid URL pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShellError {
    pub fn filter_registration(partition: impl Into<String>, reason: impl Into<String>) -> Self {
        ShellError::FilterRegistration {
            partition: partition.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        ShellError::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// True for errors coming from the settings file rather than from program logic.
    pub fn is_persistence(&self) -> bool {
        matches!(self, ShellError::Persistence { .. } | ShellError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

#[macro_export]
macro_rules! shell_error {
    (not_ready, $($arg:tt)*) => {
        $crate::error::ShellError::TargetNotReady(format!($($arg)*))
    };
    (unknown_key, $($arg:tt)*) => {
        $crate::error::ShellError::UnknownKey(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::ShellError::Internal(format!($($arg)*))
    };
}
