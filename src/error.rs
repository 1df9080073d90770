//! Unified error handling for the revharvest crate
//!
//! Provider failures are modelled by [`FetchError`] and never escape a crawl:
//! the strategies treat them as empty pages. Everything that does escape is
//! wrapped in [`Error`], which the supervisor of a harvest task turns into a
//! session in the `error` state.
//!
//! # Architecture
//!
//! - [`HarvestErrorTrait`] - Common interface implemented by the error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping the domain-specific errors

use std::io;
use thiserror::Error;

pub use crate::utils::error::{FailureKind, FetchError};

/// Common trait for revharvest error types
pub trait HarvestErrorTrait: std::error::Error {
    /// Get the error category used in logs and metrics labels
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network, DNS or timeout failure talking to a provider
    Transport,
    /// Provider payload that could not be interpreted
    MalformedResponse,
    /// Provider answered with an error status or message
    Provider,
    /// Storage and I/O errors
    Persistence,
    /// Configuration and validation errors
    Config,
    /// Anything else
    Internal,
}

impl ErrorCategory {
    /// Short machine-friendly label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
            Self::Provider => "provider",
            Self::Persistence => "persistence",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl From<FailureKind> for ErrorCategory {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Transport => Self::Transport,
            FailureKind::Malformed => Self::MalformedResponse,
            FailureKind::Provider => Self::Provider,
        }
    }
}

/// Unified error type for the revharvest crate
#[derive(Error, Debug)]
pub enum Error {
    /// Provider request errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HarvestErrorTrait for FetchError {
    fn category(&self) -> ErrorCategory {
        self.kind().into()
    }
}

impl HarvestErrorTrait for Error {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Database(_) | Self::Io(_) => ErrorCategory::Persistence,
            Self::Json(_) => ErrorCategory::MalformedResponse,
            Self::Config(_) | Self::InvalidRequest(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Internal,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
