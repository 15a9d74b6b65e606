//! Error taxonomy shared by every stage of the pipeline.
//!
//! All failures crossing a component boundary are one of the [`DataError`]
//! variants, so callers can branch on kind instead of string-matching and the
//! resolution facade can decide per-variant what to absorb and what to
//! propagate.

use std::time::Duration;

use thiserror::Error;

/// Everything that can go wrong between a URL and its playback links.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// Transport-level failure: DNS, connect, TLS, timeout, or an HTTP 5xx.
    #[error("network error: {0}")]
    Network(String),

    /// Fetched content (or a config file) could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// The resource or identifier does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream wants credentials we do not hold (HTTP 401/403).
    #[error("authentication required (HTTP {status})")]
    Authentication { status: u16 },

    /// Upstream throttled us (HTTP 429). `retry_after` comes from the
    /// `Retry-After` header when the server sent one.
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// Bad caller input, or a 4xx that fits no more specific variant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Cache bookkeeping failed.
    #[error("cache error: {0}")]
    Cache(String),

    /// Escape hatch for failures outside the taxonomy.
    #[error("unknown error: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    /// Classify an HTTP response status. Returns `None` for statuses that
    /// carry a usable body (2xx and the redirects reqwest already followed).
    ///
    /// `context` is folded into the message, usually the request URL.
    #[must_use]
    pub fn from_status(status: u16, context: &str, retry_after: Option<Duration>) -> Option<Self> {
        match status {
            200..=399 => None,
            401 | 403 => Some(Self::Authentication { status }),
            404 => Some(Self::NotFound(format!("{context} returned HTTP 404"))),
            429 => Some(Self::RateLimited { retry_after }),
            400..=499 => Some(Self::Validation(format!("{context} returned HTTP {status}"))),
            _ => Some(Self::Network(format!("{context} returned HTTP {status}"))),
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            // Malformed headers or URLs surface as builder errors before any
            // bytes hit the wire.
            Self::Validation(err.to_string())
        } else if err.is_timeout() {
            Self::Network(format!("request timed out: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for DataError {
    fn from(err: url::ParseError) -> Self {
        Self::Validation(format!("invalid url: {err}"))
    }
}
