//! Error types for the Kashi monitor

use thiserror::Error;

/// Core errors that can occur across the monitor
#[derive(Debug, Error)]
pub enum Error {
    #[error("Scan API error: {0}")]
    Scan(#[from] ScanError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Block-explorer API errors
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Scan API unreachable at {url}")]
    Unreachable { url: String },

    #[error("Scan API returned error: {message}")]
    ApiError { message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Protocol math and allocation errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Protocol not available on {network}")]
    NetworkNotSupported { network: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Inconsistent rebase for {context}: elastic={elastic}, base={base}")]
    InvalidRebase {
        context: String,
        elastic: String,
        base: String,
    },

    #[error("Internal consistency violation: {message}")]
    InternalConsistency { message: String },
}

/// Permanent cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cache key {key:?}: keys must be non-empty and free of whitespace")]
    InvalidKey { key: String },

    #[error("Cache value serialization failed: {0}")]
    Serialization(String),
}

/// Result type alias for monitor operations
pub type Result<T> = std::result::Result<T, Error>;

impl ProtocolError {
    /// Get a stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NetworkNotSupported { .. } => "network_not_supported",
            Self::InvalidInput { .. } => "invalid_input",
            Self::InvalidRebase { .. } => "invalid_rebase",
            Self::InternalConsistency { .. } => "internal_consistency",
        }
    }

    /// True when the error points at a bug or malformed upstream state
    /// rather than at the caller's input
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalConsistency { .. })
    }
}
