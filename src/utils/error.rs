//! Error types for provider calls
//!
//! Every failure of a single provider request is a [`FetchError`]. Crawlers
//! never abort on one; they count the page as empty and move on.

use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failed provider request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, DNS or timeout failure
    Transport,
    /// Payload that is not JSON or lacks the expected envelope
    Malformed,
    /// Non-success status or an error reported inside the payload
    Provider,
}

/// Errors that can occur during a provider request
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Non-success status code
    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Error message carried in an otherwise successful response
    #[error("Provider reported an error: {0}")]
    ProviderReported(String),

    /// Response body could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Header name or value rejected by the HTTP client
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Cursor kind the provider cannot serve
    #[error("Provider {provider} does not support {cursor} cursors")]
    UnsupportedCursor {
        provider: String,
        cursor: &'static str,
    },
}

impl FetchError {
    /// Map the error onto the failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http(e) if e.is_decode() => FailureKind::Malformed,
            Self::Http(_) | Self::Timeout | Self::InvalidUrl(_) | Self::InvalidHeader(_) => {
                FailureKind::Transport
            }
            Self::Malformed(_) => FailureKind::Malformed,
            Self::Status { .. } | Self::ProviderReported(_) | Self::UnsupportedCursor { .. } => {
                FailureKind::Provider
            }
        }
    }

    /// Convenience constructor for a status failure with a truncated body
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: super::truncate_text(body, 200),
        }
    }
}
