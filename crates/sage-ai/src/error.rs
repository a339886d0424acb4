//! Error types for sage-ai

use std::time::Duration;
use thiserror::Error;

/// Result type alias using sage-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the completion endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// Required configuration values are absent
    #[error("Missing required configuration: {}", .0.join(", "))]
    ConfigurationMissing(Vec<&'static str>),

    /// A configuration value is present but unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The round trip exceeded its deadline
    #[error("Request timed out after {}s", .0.as_secs())]
    NetworkTimeout(Duration),

    /// The endpoint answered with a non-success status
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The response body failed mid-stream
    #[error("Stream read failed: {0}")]
    StreamRead(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request was cancelled
    #[error("Request aborted")]
    Aborted,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StreamRead(e.to_string())
    }
}

impl Error {
    /// Create an HTTP status error
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Check if this error is worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NetworkTimeout(_)
            | Error::Http { .. }
            | Error::Request(_)
            | Error::StreamRead(_) => true,
            Error::ConfigurationMissing(_)
            | Error::InvalidConfig(_)
            | Error::Json(_)
            | Error::Aborted => false,
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_transport_failures() {
        assert!(Error::NetworkTimeout(Duration::from_secs(30)).is_retryable());
        assert!(Error::http(500, "boom").is_retryable());
        assert!(Error::http(429, "slow down").is_retryable());
        assert!(Error::StreamRead("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_not_retryable() {
        assert!(!Error::Aborted.is_retryable());
        assert!(!Error::ConfigurationMissing(vec!["endpoint"]).is_retryable());
        assert!(!Error::InvalidConfig("temperature".into()).is_retryable());
    }

    #[test]
    fn test_missing_config_lists_every_field() {
        let e = Error::ConfigurationMissing(vec!["endpoint", "api_key"]);
        assert_eq!(
            e.to_string(),
            "Missing required configuration: endpoint, api_key"
        );
    }

    #[test]
    fn test_http_error_display_and_status() {
        let e = Error::http(503, "unavailable");
        assert_eq!(e.to_string(), "HTTP error 503: unavailable");
        assert_eq!(e.status(), Some(503));
        assert_eq!(Error::Aborted.status(), None);
    }

    #[test]
    fn test_timeout_display() {
        let e = Error::NetworkTimeout(Duration::from_secs(30));
        assert_eq!(e.to_string(), "Request timed out after 30s");
    }
}
