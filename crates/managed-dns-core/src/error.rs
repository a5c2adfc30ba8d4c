//! Error types for the managed DNS system
//!
//! Per-tick failures (`SourceUnreachable`, `NoSourceAvailable`, `Provider`)
//! are recoverable and stay inside the watcher loop that produced them.
//! `Config` is fatal at provisioning time and `ShutdownTimeout` is reported
//! by the supervisor when a loop does not stop within its grace period.

use std::fmt;
use thiserror::Error;

/// Result type alias for managed DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials rejected or missing permissions
    Authentication,
    /// Zone or record does not exist
    NotFound,
    /// Backend asked us to slow down
    RateLimited,
    /// Concurrent modification on the backend
    Conflict,
    /// Network failure or backend-side 5xx
    Transient,
    /// Backend refused the request for any other reason
    Rejected,
    /// Anything that does not fit the above
    Other,
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorCode::Authentication => "authentication",
            ProviderErrorCode::NotFound => "not_found",
            ProviderErrorCode::RateLimited => "rate_limited",
            ProviderErrorCode::Conflict => "conflict",
            ProviderErrorCode::Transient => "transient",
            ProviderErrorCode::Rejected => "rejected",
            ProviderErrorCode::Other => "other",
        };
        f.write_str(s)
    }
}

/// Core error type for the managed DNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at provisioning)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single value source failed; the next one is tried
    #[error("Source {source_name} unreachable: {message}")]
    SourceUnreachable {
        /// Name of the failing source
        source_name: String,
        /// Failure description
        message: String,
    },

    /// Every configured source failed during one tick
    #[error("No source available for {hostname} ({attempts} attempted)")]
    NoSourceAvailable {
        /// Record whose sources were exhausted
        hostname: String,
        /// Number of sources tried
        attempts: usize,
    },

    /// DNS provider rejected or failed the request
    #[error("Provider error ({provider}, {code}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Failure classification
        code: ProviderErrorCode,
        /// Error message
        message: String,
    },

    /// Watcher loops that did not stop within the grace period
    #[error("Shutdown timed out waiting for: {}", .records.join(", "))]
    ShutdownTimeout {
        /// Hostnames of the loops still running
        records: Vec<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a source-unreachable error
    pub fn source_unreachable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnreachable {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a provider error
    pub fn provider(
        provider: impl Into<String>,
        code: ProviderErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            code,
            message: message.into(),
        }
    }

    /// The provider error code, if this is a provider error
    pub fn provider_code(&self) -> Option<ProviderErrorCode> {
        match self {
            Self::Provider { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the backend signalled a rate limit
    pub fn is_rate_limited(&self) -> bool {
        self.provider_code() == Some(ProviderErrorCode::RateLimited)
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
