//! Provider backed by a flagd flag definition file.
//!
//! The file uses the flagd JSON layout:
//!
//! ```json
//! {
//!   "flags": {
//!     "paymentUnreachable": {
//!       "state": "ENABLED",
//!       "variants": { "on": true, "off": false },
//!       "defaultVariant": "off"
//!     }
//!   }
//! }
//! ```
//!
//! Targeting rules are not evaluated; the default variant is always served.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{FlagError, Result};
use crate::provider::{FlagProvider, FlagValue};

#[derive(Debug, Deserialize)]
struct FlagDocument {
    #[serde(default)]
    flags: HashMap<String, FlagDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagDefinition {
    state: FlagState,
    variants: HashMap<String, serde_json::Value>,
    default_variant: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum FlagState {
    Enabled,
    Disabled,
}

/// Reads flags from a flagd definition file on every evaluation.
#[derive(Debug, Clone)]
pub struct FlagdFileProvider {
    path: PathBuf,
}

impl FlagdFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<FlagDocument> {
        let raw = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[async_trait]
impl FlagProvider for FlagdFileProvider {
    async fn resolve(&self, flag: &str) -> Result<FlagValue> {
        let document = self.load().await?;
        let definition = document
            .flags
            .get(flag)
            .ok_or_else(|| FlagError::NotFound(flag.to_string()))?;

        if definition.state == FlagState::Disabled {
            return Err(FlagError::Disabled(flag.to_string()));
        }

        let variant = definition
            .variants
            .get(&definition.default_variant)
            .ok_or_else(|| FlagError::UnknownVariant {
                flag: flag.to_string(),
                variant: definition.default_variant.clone(),
            })?;

        match variant {
            serde_json::Value::Bool(b) => Ok(FlagValue::Boolean(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(FlagValue::Int)
                .ok_or_else(|| FlagError::TypeMismatch {
                    flag: flag.to_string(),
                    expected: "integer",
                }),
            _ => Err(FlagError::TypeMismatch {
                flag: flag.to_string(),
                expected: "boolean or integer",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_FLAGS: &str = r#"{
        "$schema": "https://flagd.dev/schema/v0/flags.json",
        "flags": {
            "paymentUnreachable": {
                "description": "Payment service is unavailable",
                "state": "ENABLED",
                "variants": { "on": true, "off": false },
                "defaultVariant": "on"
            },
            "kafkaQueueProblems": {
                "state": "ENABLED",
                "variants": { "on": 100, "off": 0 },
                "defaultVariant": "on"
            },
            "adFailure": {
                "state": "DISABLED",
                "variants": { "on": true, "off": false },
                "defaultVariant": "on"
            },
            "brokenDefault": {
                "state": "ENABLED",
                "variants": { "on": true },
                "defaultVariant": "off"
            },
            "textual": {
                "state": "ENABLED",
                "variants": { "on": "yes" },
                "defaultVariant": "on"
            }
        }
    }"#;

    fn write_flags(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("flagd-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_resolves_default_variants() {
        let provider = FlagdFileProvider::new(write_flags(DEMO_FLAGS));
        assert!(provider.boolean("paymentUnreachable").await.unwrap());
        assert_eq!(provider.int("kafkaQueueProblems").await.unwrap(), 100);
        std::fs::remove_file(provider.path()).unwrap();
    }

    #[tokio::test]
    async fn test_error_cases() {
        let provider = FlagdFileProvider::new(write_flags(DEMO_FLAGS));
        assert!(matches!(
            provider.boolean("adFailure").await,
            Err(FlagError::Disabled(_))
        ));
        assert!(matches!(
            provider.boolean("missing").await,
            Err(FlagError::NotFound(_))
        ));
        assert!(matches!(
            provider.boolean("brokenDefault").await,
            Err(FlagError::UnknownVariant { .. })
        ));
        assert!(matches!(
            provider.boolean("textual").await,
            Err(FlagError::TypeMismatch { .. })
        ));
        assert!(matches!(
            provider.int("paymentUnreachable").await,
            Err(FlagError::TypeMismatch { .. })
        ));
        std::fs::remove_file(provider.path()).unwrap();
    }

    #[tokio::test]
    async fn test_edits_take_effect_without_reload() {
        let path = write_flags(DEMO_FLAGS);
        let provider = FlagdFileProvider::new(&path);
        assert_eq!(provider.int("kafkaQueueProblems").await.unwrap(), 100);

        std::fs::write(&path, DEMO_FLAGS.replace(r#""on": 100"#, r#""on": 3"#)).unwrap();
        assert_eq!(provider.int("kafkaQueueProblems").await.unwrap(), 3);
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_or_malformed_file() {
        let provider = FlagdFileProvider::new("/nonexistent/flagd.json");
        assert!(matches!(
            provider.boolean("paymentUnreachable").await,
            Err(FlagError::Io(_))
        ));

        let provider = FlagdFileProvider::new(write_flags("{ not json"));
        assert!(matches!(
            provider.boolean("paymentUnreachable").await,
            Err(FlagError::Parse(_))
        ));
        std::fs::remove_file(provider.path()).unwrap();
    }
}
