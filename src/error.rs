//! Error types for the learning context engine.
//!
//! None of these escape `ContextBuilder::build`; they exist so every
//! collaborator boundary reports a typed failure that the builder can log
//! before degrading.

use thiserror::Error;

/// Failure reading raw records for a user.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid user id {0:?}")]
    InvalidUserId(String),
}

/// Failure producing a narrative summary.
#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("summarizer not configured")]
    NotConfigured,

    #[error("summarizer request failed: {0}")]
    Request(String),

    #[error("summarizer returned malformed response: {0}")]
    Malformed(String),

    #[error("summarizer timed out after {0} ms")]
    Timeout(u64),

    #[error("summarizer task aborted: {0}")]
    Aborted(String),
}

/// Failure reading or writing the context cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Umbrella error for library consumers that want one type.
#[derive(Error, Debug)]
pub enum LearningError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Summarizer(#[from] SummarizerError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LearningError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SummarizerError::Timeout(250);
        assert_eq!(err.to_string(), "summarizer timed out after 250 ms");
    }

    #[test]
    fn cache_error_wraps_into_umbrella() {
        let err: LearningError = CacheError::Backend("down".to_string()).into();
        assert!(matches!(err, LearningError::Cache(_)));
        assert_eq!(err.to_string(), "cache backend error: down");
    }
}
