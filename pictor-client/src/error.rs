//! Error types for the images client
//!
//! The taxonomy is a tagged enum so callers classify failures by variant,
//! not by sniffing message text: rate-limit, timeout, and connection
//! failures are transient; everything else is fatal.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// `retry-after: 12` / `retry_after=1.5` patterns in API error text.
static RETRY_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry[-_ ]after\s*[:=]?\s*([0-9]+(?:\.[0-9]+)?)").unwrap()
});

/// Errors that can occur when calling the images API
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API signalled too many requests (HTTP 429)
    #[error("rate limited: {message}")]
    RateLimited {
        /// Seconds to wait, from the Retry-After header when present
        retry_after: Option<f64>,
        /// Error body returned by the API
        message: String,
    },

    /// The request timed out
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection failed or was reset
    #[error("connection failed: {0}")]
    Connection(String),

    /// API returned a non-success status code
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body returned by the API
        message: String,
    },

    /// HTTP transport failed for another reason
    #[error("transport error: {0}")]
    Transport(String),

    /// Failed to parse the response body
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Response carried no image data
    #[error("API returned no image data")]
    EmptyResponse,
}

impl ClientError {
    /// Classify a reqwest transport failure into a tagged variant.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Whether this error is a rate-limit signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. }) || matches!(self, Self::Api { status: 429, .. })
    }

    /// Whether retrying is expected to help: rate limits, timeouts, and
    /// connection failures. Everything else is fatal.
    pub fn is_transient(&self) -> bool {
        self.is_rate_limited() || matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    /// Short class name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout(_) => "timeout",
            Self::Connection(_) => "connection",
            Self::Api { .. } => "api",
            Self::Transport(_) => "transport",
            Self::Parse(_) => "parse",
            Self::EmptyResponse => "empty_response",
        }
    }

    /// Explicit retry delay hint in seconds, when the API supplied one.
    ///
    /// Precedence is deterministic: the typed `retry_after` value attached
    /// to a rate-limit error wins; only when it is absent is the error text
    /// scanned for a `retry-after: <seconds>` pattern.
    pub fn retry_after_hint(&self) -> Option<f64> {
        if let Self::RateLimited {
            retry_after: Some(secs),
            ..
        } = self
        {
            return Some(*secs);
        }

        let text = self.to_string();
        RETRY_AFTER_RE
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|secs| *secs >= 0.0)
    }
}
