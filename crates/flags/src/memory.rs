//! In-memory flag provider.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{FlagError, Result};
use crate::provider::{FlagProvider, FlagValue};

/// Flags held in process memory, toggled at runtime.
///
/// Clones share the same flag table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFlags {
    flags: Arc<RwLock<HashMap<String, FlagValue>>>,
}

impl InMemoryFlags {
    /// Creates an empty flag table; every flag evaluates as not found.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bool(&self, flag: impl Into<String>, value: bool) {
        self.set(flag, FlagValue::Boolean(value));
    }

    pub fn set_int(&self, flag: impl Into<String>, value: i64) {
        self.set(flag, FlagValue::Int(value));
    }

    pub fn set(&self, flag: impl Into<String>, value: FlagValue) {
        self.flags
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(flag.into(), value);
    }

    /// Removes a flag so it falls back to its default again.
    pub fn clear(&self, flag: &str) {
        self.flags
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(flag);
    }
}

#[async_trait]
impl FlagProvider for InMemoryFlags {
    async fn resolve(&self, flag: &str) -> Result<FlagValue> {
        self.flags
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(flag)
            .copied()
            .ok_or_else(|| FlagError::NotFound(flag.to_string()))
    }
}
