// restorecheck/src/config/validation.rs
use async_trait::async_trait;
use aws_sdk_ssm as ssm;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::errors::{AppError, Result};

/// One relational check. Both fields are required when the check runs, so a
/// malformed entry surfaces at validation time rather than at load time.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SqlCheck {
    pub database: Option<String>,
    pub statement: Option<String>,
}

/// Treats `null`, `false`, zero and empty strings, lists or objects as "not configured".
fn configured(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    })
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RdsValidationConfig {
    #[serde(default)]
    pub sql_checks: Option<Value>,
}

impl RdsValidationConfig {
    pub fn sql_checks(&self) -> Option<&Value> {
        configured(self.sql_checks.as_ref())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DynamoDbValidationConfig {
    #[serde(default)]
    pub tables: Option<Value>,
}

impl DynamoDbValidationConfig {
    pub fn tables(&self) -> Option<&Value> {
        configured(self.tables.as_ref())
    }
}

/// Per-bucket expectations. Accepts either a bare bucket name or a full object.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BucketCheck {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        expected_keys: Option<Vec<String>>,
        #[serde(default)]
        expected_min_objects: Option<u64>,
    },
}

impl BucketCheck {
    pub fn name(&self) -> &str {
        match self {
            BucketCheck::Name(name) => name,
            BucketCheck::Detailed { name, .. } => name,
        }
    }

    pub fn expected_keys(&self) -> Option<&[String]> {
        match self {
            BucketCheck::Name(_) => None,
            BucketCheck::Detailed { expected_keys, .. } => expected_keys.as_deref(),
        }
    }

    pub fn expected_min_objects(&self) -> Option<u64> {
        match self {
            BucketCheck::Name(_) => None,
            BucketCheck::Detailed {
                expected_min_objects,
                ..
            } => *expected_min_objects,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct S3ValidationConfig {
    #[serde(default)]
    pub buckets: Option<Value>,
}

impl S3ValidationConfig {
    pub fn buckets(&self) -> Option<&Value> {
        configured(self.buckets.as_ref())
    }

    /// Bucket entries that parse; anything else is logged and ignored.
    pub fn bucket_checks(&self) -> Vec<BucketCheck> {
        let Some(entries) = self.buckets().and_then(Value::as_array) else {
            return Vec::new();
        };
        entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match BucketCheck::deserialize(entry) {
                Ok(check) => Some(check),
                Err(e) => {
                    warn!(index, error = %e, "Ignoring malformed s3.buckets entry");
                    None
                }
            })
            .collect()
    }
}

/// Validation settings stored in Parameter Store, one section per resource type.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ValidationConfig {
    #[serde(default)]
    pub rds: Option<RdsValidationConfig>,
    #[serde(default)]
    pub aurora: Option<RdsValidationConfig>,
    #[serde(default)]
    pub dynamodb: Option<DynamoDbValidationConfig>,
    #[serde(default)]
    pub s3: Option<S3ValidationConfig>,
}

impl ValidationConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid validation config JSON: {}", e)))
    }

    /// Section used for both RDS and Aurora restores: `rds`, else `aurora`.
    pub fn relational(&self) -> Option<&RdsValidationConfig> {
        self.rds.as_ref().or(self.aurora.as_ref())
    }
}

/// Where the raw validation config text lives.
#[async_trait]
pub trait ParameterSource: Send + Sync {
    /// Returns the parameter value, or `None` when the parameter holds nothing.
    async fn get_parameter(&self, name: &str) -> Result<Option<String>>;
}

pub struct SsmParameterSource {
    client: ssm::Client,
}

impl SsmParameterSource {
    pub fn new(client: ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterSource for SsmParameterSource {
    async fn get_parameter(&self, name: &str) -> Result<Option<String>> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| AppError::aws("GetParameter", e))?;
        Ok(output.parameter.and_then(|p| p.value))
    }
}

/// Loads the validation config once and hands out the cached copy afterwards.
///
/// The cache lives as long as the loader; it is never refreshed.
pub struct ConfigLoader {
    source: Arc<dyn ParameterSource>,
    parameter_name: Option<String>,
    cached: OnceCell<Arc<ValidationConfig>>,
}

impl ConfigLoader {
    pub fn new(source: Arc<dyn ParameterSource>, parameter_name: Option<String>) -> Self {
        Self {
            source,
            parameter_name: parameter_name.filter(|name| !name.is_empty()),
            cached: OnceCell::new(),
        }
    }

    pub async fn load(&self) -> Result<Arc<ValidationConfig>> {
        self.cached
            .get_or_try_init(|| async {
                let Some(name) = self.parameter_name.as_deref() else {
                    debug!("No validation config parameter configured, using empty config");
                    return Ok(Arc::new(ValidationConfig::default()));
                };
                info!(parameter = name, "Loading validation config");
                let config = match self.source.get_parameter(name).await? {
                    Some(raw) if !raw.trim().is_empty() => ValidationConfig::from_json_str(&raw)?,
                    _ => ValidationConfig::default(),
                };
                Ok::<_, AppError>(Arc::new(config))
            })
            .await
            .cloned()
    }
}
