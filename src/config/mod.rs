// restorecheck/src/config/mod.rs
pub mod validation;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::restore::metadata::{RestoreTarget, restore_metadata};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_RESTORE_TIMEOUT: Duration = Duration::from_secs(55 * 60);

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonAwsConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonCopyConfig {
    pub destination_vault_arn: Option<String>,
    pub iam_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJsonConfig {
    pub backup_vault_name: Option<String>,
    pub resource_type: Option<String>,
    pub restore_role_arn: Option<String>,
    pub target_bucket: Option<String>,
    pub validator_function: Option<String>,
    pub validation_config_parameter: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub restore_timeout_secs: Option<u64>,
    pub restore_metadata: Option<HashMap<String, String>>,
    pub restore_target: Option<RestoreTarget>,
    pub copy_source_tags_to_restored_resource: Option<bool>,
    pub copy: Option<JsonCopyConfig>,
    pub aws: Option<JsonAwsConfig>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<String>,
    pub credentials: Option<StaticCredentials>,
}

/// Copy the selected recovery point into another vault before restoring it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySettings {
    pub destination_vault_arn: String,
    pub iam_role_arn: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub backup_vault_name: String,
    pub resource_type: String,
    pub restore_role_arn: Option<String>,
    pub target_bucket: Option<String>,
    /// Final StartRestoreJob metadata for the configured resource type.
    pub restore_metadata: HashMap<String, String>,
    pub copy_source_tags: bool,
    pub copy: Option<CopySettings>,
    pub poll_interval: Duration,
    pub restore_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub aws: AwsSettings,
    pub validator_function: Option<String>,
    pub validation_config_parameter: Option<String>,
    pub raw_json_config: RawJsonConfig,
}

impl AppConfig {
    /// Reads `config.json` if it exists, then layers environment overrides on top.
    pub fn load(config_path: &Path) -> Result<Self> {
        let raw = if config_path.exists() {
            RawJsonConfig::from_file(config_path)?
        } else {
            RawJsonConfig::default()
        };
        Self::from_raw(raw.with_overrides(|key| std::env::var(key).ok())?)
    }

    pub fn from_raw(raw_json_config: RawJsonConfig) -> Result<Self> {
        let aws = aws_settings_from_json(raw_json_config.aws.as_ref())?;
        Ok(AppConfig {
            aws,
            validator_function: non_empty(&raw_json_config.validator_function),
            validation_config_parameter: non_empty(&raw_json_config.validation_config_parameter),
            raw_json_config,
        })
    }
}

impl RawJsonConfig {
    pub fn from_file(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }

    /// Applies environment overrides. `lookup` is `std::env::var` outside tests.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_overrides: [(&str, &mut Option<String>); 6] = [
            ("BACKUP_VAULT_NAME", &mut self.backup_vault_name),
            ("RESOURCE_TYPE", &mut self.resource_type),
            ("RESTORE_ROLE_ARN", &mut self.restore_role_arn),
            ("TARGET_BUCKET", &mut self.target_bucket),
            ("VALIDATOR_LAMBDA", &mut self.validator_function),
            ("CONFIG_PARAM_NAME", &mut self.validation_config_parameter),
        ];
        for (key, slot) in string_overrides {
            if let Some(value) = lookup(key) {
                *slot = Some(value);
            }
        }
        if let Some(value) = lookup("COPY_DESTINATION_VAULT_ARN") {
            self.copy.get_or_insert_with(JsonCopyConfig::default).destination_vault_arn = Some(value);
        }

        if let Some(value) = lookup("POLL_INTERVAL_SECONDS") {
            self.poll_interval_secs = Some(
                value
                    .parse()
                    .with_context(|| format!("POLL_INTERVAL_SECONDS must be an integer, got '{}'", value))?,
            );
        }
        if let Some(value) = lookup("RESTORE_TIMEOUT_SECONDS") {
            self.restore_timeout_secs = Some(
                value
                    .parse()
                    .with_context(|| format!("RESTORE_TIMEOUT_SECONDS must be an integer, got '{}'", value))?,
            );
        }

        let region = lookup("AWS_REGION");
        let endpoint_url = lookup("AWS_ENDPOINT_URL");
        if region.is_some() || endpoint_url.is_some() {
            let aws = self.aws.get_or_insert_with(JsonAwsConfig::default);
            if region.is_some() {
                aws.region = region;
            }
            if endpoint_url.is_some() {
                aws.endpoint_url = endpoint_url;
            }
        }
        Ok(self)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.trim().is_empty())
}

fn aws_settings_from_json(raw: Option<&JsonAwsConfig>) -> Result<AwsSettings> {
    let Some(raw) = raw else {
        return Ok(AwsSettings::default());
    };

    let endpoint_url = non_empty(&raw.endpoint_url);
    if let Some(endpoint) = &endpoint_url {
        Url::parse(endpoint).with_context(|| format!("Invalid aws.endpoint_url: {}", endpoint))?;
    }

    let credentials = match (non_empty(&raw.access_key_id), non_empty(&raw.secret_access_key)) {
        (Some(access_key_id), Some(secret_access_key)) => Some(StaticCredentials {
            access_key_id,
            secret_access_key,
        }),
        (None, None) => None,
        _ => {
            // Only warn if some credential fields were provided but are incomplete
            warn!("aws.access_key_id and aws.secret_access_key must be set together; falling back to the default credential chain");
            None
        }
    };

    Ok(AwsSettings {
        region: non_empty(&raw.region),
        profile: non_empty(&raw.profile),
        endpoint_url,
        credentials,
    })
}

/// Builds the orchestrator settings, failing on anything a restore run cannot do without.
pub fn load_orchestrator_config(raw_config: &RawJsonConfig) -> Result<OrchestratorConfig> {
    let backup_vault_name = non_empty(&raw_config.backup_vault_name)
        .context("backup_vault_name (or BACKUP_VAULT_NAME) must be set to run a restore")?;
    let resource_type = non_empty(&raw_config.resource_type)
        .context("resource_type (or RESOURCE_TYPE) must be set to run a restore")?;

    let poll_interval = raw_config
        .poll_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_POLL_INTERVAL);
    let restore_timeout = raw_config
        .restore_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RESTORE_TIMEOUT);

    if poll_interval.is_zero() {
        return Err(anyhow::anyhow!("poll_interval_secs must be greater than zero"));
    }
    if restore_timeout.is_zero() {
        return Err(anyhow::anyhow!("restore_timeout_secs must be greater than zero"));
    }

    let target_bucket = non_empty(&raw_config.target_bucket);
    let restore_metadata = restore_metadata(
        &resource_type,
        &raw_config.restore_target.clone().unwrap_or_default(),
        target_bucket.as_deref(),
        &raw_config.restore_metadata.clone().unwrap_or_default(),
    )?;

    let copy = match &raw_config.copy {
        Some(copy) => Some(CopySettings {
            destination_vault_arn: non_empty(&copy.destination_vault_arn)
                .context("copy.destination_vault_arn must be set when copy is configured")?,
            iam_role_arn: non_empty(&copy.iam_role_arn),
        }),
        None => None,
    };

    Ok(OrchestratorConfig {
        backup_vault_name,
        resource_type,
        restore_role_arn: non_empty(&raw_config.restore_role_arn),
        target_bucket,
        restore_metadata,
        copy_source_tags: raw_config.copy_source_tags_to_restored_resource.unwrap_or(false),
        copy,
        poll_interval,
        restore_timeout,
    })
}
