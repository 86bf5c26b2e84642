//! Error types for the monthly report pipeline.
//!
//! Library crates use [`ReportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for every pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Spreadsheet read or credential failure.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// Source table is empty or lacks what the analysis needs.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Text generation service error, quota, or empty response.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Document store error.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Chat service error. Callers log this instead of propagating it.
    #[error("notify failed: {0}")]
    NotifyFailed(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short taxonomy name, used as the prefix of failure notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "SourceUnavailable",
            Self::InsufficientData(_) => "InsufficientData",
            Self::GenerationFailed(_) => "GenerationFailed",
            Self::PublishFailed(_) => "PublishFailed",
            Self::NotifyFailed(_) => "NotifyFailed",
            Self::Config { .. } => "ConfigError",
            Self::Io { .. } => "IoError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ReportError::config("missing GOOGLE_SHEET_ID");
        assert_eq!(err.to_string(), "config error: missing GOOGLE_SHEET_ID");

        let err = ReportError::GenerationFailed("HTTP 429".into());
        assert!(err.to_string().contains("HTTP 429"));
    }

    #[test]
    fn kind_names_the_taxonomy() {
        assert_eq!(
            ReportError::SourceUnavailable("x".into()).kind(),
            "SourceUnavailable"
        );
        assert_eq!(ReportError::PublishFailed("x".into()).kind(), "PublishFailed");
        assert_eq!(ReportError::config("x").kind(), "ConfigError");
    }
}
