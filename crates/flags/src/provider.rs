//! Flag provider trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FlagError, Result};

/// A resolved flag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Boolean(bool),
    Int(i64),
}

impl FlagValue {
    /// Returns the boolean, or a type mismatch for `flag`.
    pub fn as_bool(self, flag: &str) -> Result<bool> {
        match self {
            FlagValue::Boolean(b) => Ok(b),
            FlagValue::Int(_) => Err(FlagError::TypeMismatch {
                flag: flag.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// Returns the integer, or a type mismatch for `flag`.
    pub fn as_int(self, flag: &str) -> Result<i64> {
        match self {
            FlagValue::Int(i) => Ok(i),
            FlagValue::Boolean(_) => Err(FlagError::TypeMismatch {
                flag: flag.to_string(),
                expected: "integer",
            }),
        }
    }
}

/// Source of flag values.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait FlagProvider: Send + Sync {
    /// Resolves the current value of a flag.
    async fn resolve(&self, flag: &str) -> Result<FlagValue>;

    /// Evaluates a boolean flag.
    async fn boolean(&self, flag: &str) -> Result<bool> {
        self.resolve(flag).await?.as_bool(flag)
    }

    /// Evaluates an integer flag.
    async fn int(&self, flag: &str) -> Result<i64> {
        self.resolve(flag).await?.as_int(flag)
    }
}
