use std::time::Duration;

use thiserror::Error;

/// Why a fetch produced no snapshot.
///
/// Every variant is handled the same way by the refresh machinery: the
/// failure is logged, the prior snapshot stays visible and the error backoff
/// decides when to try again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The host could not be reached or the connection broke.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with a non-success status code.
    #[error("server returned HTTP {0}")]
    Status(u16),
    /// The body was not valid JSON, or a required field was missing or malformed.
    #[error("parse error: {0}")]
    Parse(String),
    /// The fetch did not finish within the supervisor's bound.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    /// The source is not configured well enough to issue a request.
    #[error("not configured: {0}")]
    Config(String),
    /// The worker task died before reporting a result.
    #[error("fetch worker failed: {0}")]
    Worker(String),
}

impl FetchError {
    pub fn missing(path: &str) -> Self {
        Self::Parse(format!("missing or malformed field `{path}`"))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Network(err.to_string()),
        }
    }
}
