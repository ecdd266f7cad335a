//! Flag evaluation errors.

use thiserror::Error;

/// Errors a provider may report while evaluating a flag.
///
/// These never reach request handling; [`crate::FaultInjector`] turns them
/// into the flag default.
#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag '{0}' is not defined")]
    NotFound(String),

    #[error("flag '{0}' is disabled")]
    Disabled(String),

    #[error("flag '{flag}' does not hold a {expected} value")]
    TypeMismatch { flag: String, expected: &'static str },

    #[error("flag '{flag}' has no variant named '{variant}'")]
    UnknownVariant { flag: String, variant: String },

    #[error("failed to read flag source: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse flag source: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Convenience type alias for flag results.
pub type Result<T> = std::result::Result<T, FlagError>;
