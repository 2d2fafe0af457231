// restorecheck/src/restore/metadata.rs
use serde::Deserialize;
use std::collections::HashMap;

use crate::errors::{AppError, Result};

/// Security groups as a JSON list or an already comma-joined string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SecurityGroupIds {
    List(Vec<String>),
    Joined(String),
}

impl SecurityGroupIds {
    pub fn joined(&self) -> String {
        match self {
            SecurityGroupIds::List(ids) => ids.join(","),
            SecurityGroupIds::Joined(ids) => ids.clone(),
        }
    }
}

/// Where the restored resource should land. Only the fields relevant to the
/// configured resource type are sent.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RestoreTarget {
    pub db_instance_identifier: Option<String>,
    pub db_instance_class: Option<String>,
    pub db_cluster_identifier: Option<String>,
    pub db_subnet_group_name: Option<String>,
    pub vpc_security_group_ids: Option<SecurityGroupIds>,
    pub target_table_name: Option<String>,
}

/// Builds the StartRestoreJob metadata for `resource_type`.
///
/// Typed target fields go in first, then `destinationBucketName` when a target
/// bucket is set, then `overrides`, which win on key clashes.
pub fn restore_metadata(
    resource_type: &str,
    target: &RestoreTarget,
    target_bucket: Option<&str>,
    overrides: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut metadata = HashMap::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            metadata.insert(key.to_string(), value);
        }
    };

    match resource_type {
        "RDS" => {
            put("DBInstanceIdentifier", target.db_instance_identifier.clone());
            put("DBInstanceClass", target.db_instance_class.clone());
            put("DBSubnetGroupName", target.db_subnet_group_name.clone());
            put("VpcSecurityGroupIds", target.vpc_security_group_ids.as_ref().map(SecurityGroupIds::joined));
        }
        "Aurora" => {
            put("DBClusterIdentifier", target.db_cluster_identifier.clone());
            put("DBSubnetGroupName", target.db_subnet_group_name.clone());
            put("VpcSecurityGroupIds", target.vpc_security_group_ids.as_ref().map(SecurityGroupIds::joined));
        }
        "DynamoDB" => put("targetTableName", target.target_table_name.clone()),
        _ => {}
    }
    put("destinationBucketName", target_bucket.map(str::to_string));

    metadata.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    if let Some(required) = required_key(resource_type) {
        if !metadata.get(required).is_some_and(|v| !v.is_empty()) {
            return Err(AppError::Config(format!(
                "{} restores need '{}' (set restore_target or restore_metadata)",
                resource_type, required
            )));
        }
    }
    Ok(metadata)
}

fn required_key(resource_type: &str) -> Option<&'static str> {
    match resource_type {
        "RDS" => Some("DBInstanceIdentifier"),
        "Aurora" => Some("DBClusterIdentifier"),
        "DynamoDB" => Some("targetTableName"),
        _ => None,
    }
}
