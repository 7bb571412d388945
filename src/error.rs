// src/error.rs
//! Error taxonomy for the pipeline. One enum per failure domain so callers
//! can match on the variants that drive policy (retry, skip, degrade).

use thiserror::Error;

/// Failures while fetching a feed or page over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Transient failures are worth another attempt; 4xx other than 429 are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::HttpStatus(status) => *status == 429 || *status >= 500,
            FetchError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// A raw entry that cannot be turned into a canonical article.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("entry missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Failures of a single sentiment model adapter. The ensemble absorbs all
/// of these; only `RateLimited`/`Client` drive the LLM retry path.
#[derive(Debug, Error)]
pub enum ModelAdapterError {
    #[error("adapter unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("client error: {0}")]
    Client(String),
    #[error("unexpected adapter error: {0}")]
    Unexpected(String),
}

/// Validation failures on caller-supplied data.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing title")]
    MissingTitle,
    #[error("missing link")]
    MissingLink,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_matches_status_classes() {
        assert!(FetchError::Timeout.is_retryable());
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(FetchError::HttpStatus(429).is_retryable());
        assert!(FetchError::HttpStatus(503).is_retryable());
        assert!(!FetchError::HttpStatus(404).is_retryable());
        assert!(!FetchError::HttpStatus(403).is_retryable());
        assert!(!FetchError::Parse("bad xml".into()).is_retryable());
    }
}
