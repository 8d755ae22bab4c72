//! Error types for maestro-classify

use thiserror::Error;

/// Classifier error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl Error {
    /// Whether the error is worth a single retry
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RateLimit | Error::Network(_) | Error::Timeout(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::RateLimit.is_transient());
        assert!(Error::Timeout(5000).is_transient());
        assert!(Error::Network("connection reset".to_string()).is_transient());

        assert!(!Error::Api("bad request".to_string()).is_transient());
        assert!(!Error::InvalidResponse("not json".to_string()).is_transient());
        assert!(!Error::NotConfigured("no key".to_string()).is_transient());
    }
}
