//! Error types for the poll workspace.

use thiserror::Error;

/// Result type alias using the workspace error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for poll services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error while talking to a poll source
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// The operation was cancelled by its caller
    #[error("Operation cancelled")]
    Cancelled,

    /// The on-disk cache could not be encoded or decoded
    #[error("Cache error: {0}")]
    Cache(String),

    /// A crawl produced nothing usable; `source` is the first page failure
    #[error("Crawl failed with {failed} unavailable page(s): {source}")]
    Crawl {
        failed: usize,
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_error_keeps_first_failure() {
        let err = Error::Crawl {
            failed: 2,
            source: Box::new(Error::Timeout),
        };
        assert_eq!(
            err.to_string(),
            "Crawl failed with 2 unavailable page(s): Operation timed out"
        );
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Operation timed out"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Network("reset".into()).is_cancelled());
    }
}
