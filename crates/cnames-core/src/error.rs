//! Error types for the CNAME registry tooling
//!
//! Only conditions that abort an operation are errors. Per-line parse
//! problems ([`crate::ParseWarning`]) and per-URL probe problems
//! ([`crate::ProbeFailure`]) are reported as values instead.

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the registry tooling
#[derive(Error, Debug)]
pub enum Error {
    /// The data block markers could not be located; no registry is produced
    #[error("Structural parse failure: {0}")]
    StructuralParse(String),

    /// The reference file does not have the header/footer comment blocks
    #[error("Generation failure: {0}")]
    Generation(String),

    /// Cache store errors
    #[error("Cache store error: {0}")]
    CacheStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP errors outside of probing (e.g. fetching the registry file)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a structural parse error
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::StructuralParse(msg.into())
    }

    /// Create a generation error
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a cache store error
    pub fn cache_store(msg: impl Into<String>) -> Self {
        Self::CacheStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for failures that mean the file's shape could not be understood
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::StructuralParse(_) | Self::Generation(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
