use thiserror::Error;

/// Top-level error type for the Tanya system.
///
/// Subsystem crates define their own error types and implement
/// `From<TanyaError>` (or the reverse) so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TanyaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TanyaError {
    fn from(err: toml::de::Error) -> Self {
        TanyaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TanyaError {
    fn from(err: toml::ser::Error) -> Self {
        TanyaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TanyaError {
    fn from(err: serde_json::Error) -> Self {
        TanyaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Tanya operations.
pub type Result<T> = std::result::Result<T, TanyaError>;
