// restorecheck/src/validation/request.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::errors::{AppError, Result};

static S3_BUCKET_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-zA-Z-]*:s3:::([^/]+)").expect("static S3 ARN pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

/// Everything a validator needs to know about one finished restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    #[serde(default)]
    pub restore_job_id: String,
    #[serde(default)]
    pub recovery_point_arn: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_resource_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_min_objects: Option<u64>,
}

impl ValidationRequest {
    /// Parses a validator event. Events routed through EventBridge carry the
    /// request under `detail`; its fields win over top-level ones.
    pub fn from_event(event: Value) -> Result<Self> {
        let merged = match event {
            Value::Object(mut top) => {
                if let Some(Value::Object(detail)) = top.remove("detail") {
                    for (key, value) in detail {
                        if !value.is_null() {
                            top.insert(key, value);
                        }
                    }
                }
                Value::Object(top)
            }
            other => {
                return Err(AppError::Config(format!(
                    "Validation event must be a JSON object, got: {}",
                    other
                )));
            }
        };
        Ok(serde_json::from_value(merged)?)
    }

    /// Bucket named explicitly by the request: `targetBucket` first, then `s3.bucket`.
    pub fn requested_bucket(&self) -> Option<&str> {
        self.target_bucket
            .as_deref()
            .or_else(|| self.s3.as_ref().and_then(|s3| s3.bucket.as_deref()))
            .filter(|bucket| !bucket.is_empty())
    }

    /// Requested bucket, falling back to the bucket of an S3 `createdResourceArn`.
    pub fn resolve_bucket(&self) -> Option<String> {
        self.requested_bucket().map(str::to_string).or_else(|| {
            self.created_resource_arn
                .as_deref()
                .and_then(bucket_from_arn)
        })
    }
}

/// Extracts the bucket name from an S3 bucket or object ARN.
pub fn bucket_from_arn(arn: &str) -> Option<String> {
    S3_BUCKET_ARN
        .captures(arn)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_uses_camel_case_and_omits_absent_fields() -> anyhow::Result<()> {
        let request = ValidationRequest {
            restore_job_id: "job-1".into(),
            recovery_point_arn: "arn:rp".into(),
            resource_type: "S3".into(),
            created_resource_arn: Some("arn:aws:s3:::restored".into()),
            target_bucket: Some("restored".into()),
            s3: Some(S3Context {
                bucket: Some("restored".into()),
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request)?,
            json!({
                "restoreJobId": "job-1",
                "recoveryPointArn": "arn:rp",
                "resourceType": "S3",
                "createdResourceArn": "arn:aws:s3:::restored",
                "targetBucket": "restored",
                "s3": {"bucket": "restored"}
            })
        );
        Ok(())
    }

    #[test]
    fn test_from_event_prefers_detail_fields() -> anyhow::Result<()> {
        let event = json!({
            "restoreJobId": "outer",
            "resourceType": "RDS",
            "detail": {
                "restoreJobId": "inner",
                "createdResourceArn": "arn:aws:rds:eu-west-1:123:db:restored",
                "resourceType": null
            }
        });
        let request = ValidationRequest::from_event(event)?;
        assert_eq!(request.restore_job_id, "inner");
        assert_eq!(request.resource_type, "RDS");
        assert_eq!(
            request.created_resource_arn.as_deref(),
            Some("arn:aws:rds:eu-west-1:123:db:restored")
        );
        Ok(())
    }

    #[test]
    fn test_from_event_rejects_non_object() {
        assert!(ValidationRequest::from_event(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_bucket_resolution_order() {
        let mut request = ValidationRequest {
            created_resource_arn: Some("arn:aws:s3:::from-arn".into()),
            s3: Some(S3Context {
                bucket: Some("from-context".into()),
            }),
            target_bucket: Some("from-target".into()),
            ..Default::default()
        };
        assert_eq!(request.resolve_bucket().as_deref(), Some("from-target"));

        request.target_bucket = None;
        assert_eq!(request.resolve_bucket().as_deref(), Some("from-context"));

        request.s3 = None;
        assert_eq!(request.requested_bucket(), None);
        assert_eq!(request.resolve_bucket().as_deref(), Some("from-arn"));

        request.created_resource_arn = Some("arn:aws:dynamodb:us-east-1:1:table/t".into());
        assert_eq!(request.resolve_bucket(), None);
    }

    #[test]
    fn test_bucket_from_arn_handles_partitions_and_object_arns() {
        assert_eq!(bucket_from_arn("arn:aws:s3:::my-bucket").as_deref(), Some("my-bucket"));
        assert_eq!(
            bucket_from_arn("arn:aws-us-gov:s3:::gov-bucket/some/key").as_deref(),
            Some("gov-bucket")
        );
        assert_eq!(bucket_from_arn("not-an-arn"), None);
    }
}
