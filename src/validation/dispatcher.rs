// restorecheck/src/validation/dispatcher.rs
use std::fmt;
use tracing::{info, warn};

use super::request::ValidationRequest;
use super::result::ValidationResult;
use super::s3_objects::{ObjectStore, check_bucket_objects};
use crate::config::validation::{
    DynamoDbValidationConfig, RdsValidationConfig, S3ValidationConfig, SqlCheck, ValidationConfig,
};
use serde::Deserialize;
use crate::errors::{AppError, Result};

/// Resource types with a dedicated validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceType {
    Rds,
    Aurora,
    DynamoDb,
    S3,
    Unsupported(String),
}

impl ResourceType {
    /// Matches the resource type names AWS Backup reports. Exact match only.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "RDS" => ResourceType::Rds,
            "Aurora" => ResourceType::Aurora,
            "DynamoDB" => ResourceType::DynamoDb,
            "S3" => ResourceType::S3,
            other => ResourceType::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Rds => f.write_str("RDS"),
            ResourceType::Aurora => f.write_str("Aurora"),
            ResourceType::DynamoDb => f.write_str("DynamoDB"),
            ResourceType::S3 => f.write_str("S3"),
            ResourceType::Unsupported(other) => f.write_str(other),
        }
    }
}

/// Routes a finished restore to the validator for its resource type.
pub struct Dispatcher<S> {
    object_store: S,
}

impl<S: ObjectStore> Dispatcher<S> {
    pub fn new(object_store: S) -> Self {
        Self { object_store }
    }

    /// Runs the matching validator. Never fails: validator errors come back as
    /// a FAILED result carrying the error text.
    pub async fn dispatch(
        &self,
        request: &ValidationRequest,
        config: &ValidationConfig,
    ) -> ValidationResult {
        let resource_type = ResourceType::parse(&request.resource_type);
        info!(
            restore_job_id = request.restore_job_id.as_str(),
            resource_type = %resource_type,
            created_resource_arn = request.created_resource_arn.as_deref().unwrap_or(""),
            "Dispatching validation"
        );

        let outcome = match &resource_type {
            ResourceType::Rds | ResourceType::Aurora => {
                validate_rds_like(&resource_type, config.relational())
            }
            ResourceType::DynamoDb => validate_dynamodb(config.dynamodb.as_ref()),
            ResourceType::S3 => self.validate_s3(request, config.s3.as_ref()).await,
            ResourceType::Unsupported(other) => {
                Ok(ValidationResult::skipped(format!("No validator for {}", other)))
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(resource_type = %resource_type, error = %e, "Validator raised an error");
                unhandled_error(&e)
            }
        };
        info!(status = %result.status, message = result.message.as_str(), "Validation finished");
        result
    }

    async fn validate_s3(
        &self,
        request: &ValidationRequest,
        cfg: Option<&S3ValidationConfig>,
    ) -> Result<ValidationResult> {
        let Some(cfg) = cfg.filter(|c| c.buckets().is_some()) else {
            return Ok(ValidationResult::skipped("No s3 buckets configured"));
        };

        let bucket = request.resolve_bucket();
        let buckets = cfg.bucket_checks();
        let configured = bucket
            .as_deref()
            .and_then(|name| buckets.iter().find(|b| b.name() == name));

        let expected_keys = request
            .expected_keys
            .as_deref()
            .filter(|keys| !keys.is_empty())
            .or_else(|| configured.and_then(|b| b.expected_keys()));
        let expected_min_objects = request
            .expected_min_objects
            .or_else(|| configured.and_then(|b| b.expected_min_objects()));

        check_bucket_objects(
            &self.object_store,
            bucket.as_deref(),
            expected_keys,
            expected_min_objects,
        )
        .await
    }
}

fn validate_rds_like(
    resource_type: &ResourceType,
    cfg: Option<&RdsValidationConfig>,
) -> Result<ValidationResult> {
    let Some(checks) = cfg.and_then(RdsValidationConfig::sql_checks) else {
        return Ok(ValidationResult::skipped("No sql_checks configured"));
    };
    let checks = checks
        .as_array()
        .ok_or_else(|| AppError::ValidatorRuntime("sql_checks must be a list".to_string()))?;

    for (index, entry) in checks.iter().enumerate() {
        let check = SqlCheck::deserialize(entry).map_err(|e| {
            AppError::ValidatorRuntime(format!("sql_checks[{}] is malformed: {}", index, e))
        })?;
        let database = check.database.as_deref().ok_or_else(|| {
            AppError::ValidatorRuntime(format!("sql_checks[{}] is missing 'database'", index))
        })?;
        let statement = check.statement.as_deref().ok_or_else(|| {
            AppError::ValidatorRuntime(format!("sql_checks[{}] is missing 'statement'", index))
        })?;
        // Statements are not executed against the restored instance yet.
        info!(resource_type = %resource_type, database, statement, "Accepted SQL check");
    }
    Ok(ValidationResult::successful(
        "All RDS/Aurora checks passed (placeholder)",
    ))
}

fn validate_dynamodb(cfg: Option<&DynamoDbValidationConfig>) -> Result<ValidationResult> {
    let Some(tables) = cfg.and_then(DynamoDbValidationConfig::tables) else {
        return Ok(ValidationResult::skipped("No dynamodb tables configured"));
    };
    info!(tables = %tables, "DynamoDB tables configured for validation");
    Ok(ValidationResult::successful("DynamoDB validation placeholder"))
}

/// FAILED result for an error raised while validating.
pub fn unhandled_error(err: &AppError) -> ValidationResult {
    let text = match err {
        AppError::ValidatorRuntime(message) => message.clone(),
        other => other.to_string(),
    };
    ValidationResult::failed(format!("Unhandled validator error: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::result::ValidationStatus;
    use crate::validation::s3_objects::tests::FakeObjectStore;
    use serde_json::json;

    fn request(resource_type: &str) -> ValidationRequest {
        ValidationRequest {
            restore_job_id: "job-1".into(),
            recovery_point_arn: "arn:aws:backup:eu-west-1:1:recovery-point:rp".into(),
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    fn config(value: serde_json::Value) -> ValidationConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_resource_type_parse_is_exact() {
        assert_eq!(ResourceType::parse("RDS"), ResourceType::Rds);
        assert_eq!(ResourceType::parse("DynamoDB"), ResourceType::DynamoDb);
        assert_eq!(
            ResourceType::parse("rds"),
            ResourceType::Unsupported("rds".to_string())
        );
        assert_eq!(ResourceType::parse("Aurora").to_string(), "Aurora");
    }

    #[tokio::test]
    async fn test_unknown_type_is_skipped() {
        let dispatcher = Dispatcher::new(FakeObjectStore::default());
        let result = dispatcher
            .dispatch(&request("EFS"), &ValidationConfig::default())
            .await;
        assert_eq!(result, ValidationResult::skipped("No validator for EFS"));
    }

    #[tokio::test]
    async fn test_variants_skip_without_config_section() {
        let dispatcher = Dispatcher::new(FakeObjectStore::default());
        let empty = ValidationConfig::default();
        let cases = [
            ("RDS", "No sql_checks configured"),
            ("Aurora", "No sql_checks configured"),
            ("DynamoDB", "No dynamodb tables configured"),
            ("S3", "No s3 buckets configured"),
        ];
        for (resource_type, message) in cases {
            let result = dispatcher.dispatch(&request(resource_type), &empty).await;
            assert_eq!(result, ValidationResult::skipped(message));
        }

        let empty_lists = config(json!({
            "rds": {"sql_checks": []},
            "dynamodb": {"tables": []},
            "s3": {"buckets": []}
        }));
        let result = dispatcher.dispatch(&request("RDS"), &empty_lists).await;
        assert_eq!(result.status, ValidationStatus::Skipped);
        let result = dispatcher.dispatch(&request("DynamoDB"), &empty_lists).await;
        assert_eq!(result.status, ValidationStatus::Skipped);
    }

    #[tokio::test]
    async fn test_configured_placeholders_succeed() {
        let dispatcher = Dispatcher::new(FakeObjectStore::default());
        let cfg = config(json!({
            "aurora": {"sql_checks": [{"database": "app", "statement": "SELECT 1"}]},
            "dynamodb": {"tables": ["orders"]}
        }));
        let result = dispatcher.dispatch(&request("Aurora"), &cfg).await;
        assert_eq!(
            result,
            ValidationResult::successful("All RDS/Aurora checks passed (placeholder)")
        );
        let result = dispatcher.dispatch(&request("DynamoDB"), &cfg).await;
        assert_eq!(result, ValidationResult::successful("DynamoDB validation placeholder"));
    }

    #[tokio::test]
    async fn test_validator_errors_become_failed_results() {
        let dispatcher = Dispatcher::new(FakeObjectStore::default());
        let cfg = config(json!({
            "rds": {"sql_checks": [{"database": "app"}]}
        }));
        let result = dispatcher.dispatch(&request("RDS"), &cfg).await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(
            result.message,
            "Unhandled validator error: sql_checks[0] is missing 'statement'"
        );
    }

    #[tokio::test]
    async fn test_loosely_shaped_sections_are_accepted() {
        let dispatcher = Dispatcher::new(FakeObjectStore::with_pages(&[2]));
        let cfg = config(json!({
            "dynamodb": {"tables": [{"name": "orders"}]},
            "s3": {"buckets": [{"bucket": "not-a-check"}]}
        }));
        let result = dispatcher.dispatch(&request("DynamoDB"), &cfg).await;
        assert_eq!(result, ValidationResult::successful("DynamoDB validation placeholder"));

        let mut req = request("S3");
        req.target_bucket = Some("restored".into());
        let result = dispatcher.dispatch(&req, &cfg).await;
        assert_eq!(result, ValidationResult::successful("Found 2 objects (>= 1)"));
    }

    #[tokio::test]
    async fn test_sql_checks_of_the_wrong_shape_fail() {
        let dispatcher = Dispatcher::new(FakeObjectStore::default());
        let cfg = config(json!({"rds": {"sql_checks": {"app": "SELECT 1"}}}));
        let result = dispatcher.dispatch(&request("RDS"), &cfg).await;
        assert_eq!(
            result,
            ValidationResult::failed("Unhandled validator error: sql_checks must be a list")
        );

        let cfg = config(json!({"aurora": {"sql_checks": ["SELECT 1"]}}));
        let result = dispatcher.dispatch(&request("Aurora"), &cfg).await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.message.starts_with("Unhandled validator error: sql_checks[0] is malformed"));
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl ObjectStore for FailingStore {
        async fn object_exists(&self, _bucket: &str, _key: &str) -> Result<bool> {
            Ok(true)
        }

        async fn list_page(
            &self,
            _bucket: &str,
            _max_keys: i32,
            _continuation_token: Option<String>,
        ) -> Result<crate::validation::s3_objects::ListPage> {
            Err(AppError::aws(
                "ListObjectsV2",
                std::io::Error::other("connection reset"),
            ))
        }
    }

    #[tokio::test]
    async fn test_store_errors_never_escape_dispatch() {
        let dispatcher = Dispatcher::new(FailingStore);
        let cfg = config(json!({"s3": {"buckets": ["restored"]}}));
        let mut req = request("S3");
        req.target_bucket = Some("restored".into());

        let result = dispatcher.dispatch(&req, &cfg).await;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.message.starts_with("Unhandled validator error: "));
        assert!(result.message.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_s3_uses_request_expectations() {
        let dispatcher = Dispatcher::new(FakeObjectStore::with_keys(&["a"]));
        let cfg = config(json!({"s3": {"buckets": ["restored"]}}));
        let mut req = request("S3");
        req.target_bucket = Some("restored".into());
        req.expected_keys = Some(vec!["a".into(), "b".into()]);

        let result = dispatcher.dispatch(&req, &cfg).await;
        assert_eq!(result.message, "Missing 1 objects");
        assert_eq!(result.missing, Some(vec!["b".to_string()]));
    }

    #[tokio::test]
    async fn test_s3_falls_back_to_configured_bucket_expectations() {
        let dispatcher = Dispatcher::new(FakeObjectStore::with_pages(&[4]));
        let cfg = config(json!({"s3": {"buckets": [
            {"name": "restored", "expected_min_objects": 5}
        ]}}));
        let mut req = request("S3");
        req.created_resource_arn = Some("arn:aws:s3:::restored".into());

        let result = dispatcher.dispatch(&req, &cfg).await;
        assert_eq!(result, ValidationResult::failed("Only 4 objects found (< 5)"));
    }

    #[tokio::test]
    async fn test_s3_without_resolvable_bucket_is_skipped() {
        let dispatcher = Dispatcher::new(FakeObjectStore::default());
        let cfg = config(json!({"s3": {"buckets": ["restored"]}}));
        let result = dispatcher.dispatch(&request("S3"), &cfg).await;
        assert_eq!(result, ValidationResult::skipped("No bucket specified"));
    }
}
