// restorecheck/src/restore/validator_client.rs
use async_trait::async_trait;
use aws_sdk_lambda as lambda;
use lambda::primitives::Blob;
use lambda::types::InvocationType;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::validation::ConfigLoader;
use crate::errors::{AppError, Result};
use crate::validation::dispatcher::{Dispatcher, unhandled_error};
use crate::validation::request::ValidationRequest;
use crate::validation::result::{ValidationResult, ValidatorResponse};
use crate::validation::s3_objects::ObjectStore;

/// Hands a validation request to a validator and returns its verdict.
///
/// Errors raised inside the validator come back as a FAILED result. Only a
/// reply that cannot be read at all is an error.
#[async_trait]
pub trait ValidatorClient: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult>;
}

/// Parses a validator reply. A missing or malformed payload is fatal to the run.
pub fn parse_validator_payload(payload: Option<Vec<u8>>) -> Result<ValidationResult> {
    let payload = payload
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::ValidatorInvocation("Validator returned no payload".to_string()))?;
    let text = String::from_utf8_lossy(&payload);
    let response: ValidatorResponse = serde_json::from_str(&text).map_err(|_| {
        AppError::ValidatorInvocation(format!("Validator payload JSON parse error: {}", text))
    })?;
    Ok(response.normalize())
}

/// Reads `errorMessage` from a Lambda error document, falling back to the raw text.
fn function_error_message(function_error: &str, payload: Option<&[u8]>) -> String {
    let text = payload.map(String::from_utf8_lossy).unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|doc| doc.get("errorMessage").and_then(Value::as_str).map(str::to_string))
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| format!("validator function error ({})", function_error))
}

/// Invokes a deployed validator Lambda synchronously.
pub struct LambdaValidatorClient {
    client: lambda::Client,
    function_name: String,
}

impl LambdaValidatorClient {
    pub fn new(client: lambda::Client, function_name: impl Into<String>) -> Self {
        Self {
            client,
            function_name: function_name.into(),
        }
    }
}

#[async_trait]
impl ValidatorClient for LambdaValidatorClient {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        let body = serde_json::to_vec(request)?;
        debug!(function = self.function_name.as_str(), bytes = body.len(), "Invoking validator");

        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(body))
            .send()
            .await
            .map_err(|e| AppError::aws("Invoke", e))?;

        let function_error = output.function_error;
        let payload = output.payload.map(Blob::into_inner);
        if let Some(function_error) = function_error.as_deref() {
            // The payload holds the Lambda error document, not a verdict.
            let message = function_error_message(function_error, payload.as_deref());
            warn!(
                function = self.function_name.as_str(),
                function_error,
                error_message = message.as_str(),
                "Validator function raised"
            );
            return Ok(ValidationResult::failed(format!(
                "Unhandled validator error: {}",
                message
            )));
        }
        parse_validator_payload(payload)
    }
}

/// Runs the built-in dispatcher in-process instead of calling out to Lambda.
pub struct LocalValidatorClient<S> {
    dispatcher: Dispatcher<S>,
    config_loader: Arc<ConfigLoader>,
}

impl<S: ObjectStore> LocalValidatorClient<S> {
    pub fn new(dispatcher: Dispatcher<S>, config_loader: Arc<ConfigLoader>) -> Self {
        Self {
            dispatcher,
            config_loader,
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ValidatorClient for LocalValidatorClient<S> {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        let config = match self.config_loader.load().await {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    restore_job_id = request.restore_job_id.as_str(),
                    error = %e,
                    "Validation config unavailable"
                );
                return Ok(unhandled_error(&e));
            }
        };
        Ok(self.dispatcher.dispatch(request, &config).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::ParameterSource;
    use crate::validation::result::ValidationStatus;
    use crate::validation::s3_objects::tests::FakeObjectStore;
    use aws_smithy_http_client::test_util::infallible_client_fn;
    use lambda::config::{BehaviorVersion, Credentials, Region};
    use std::sync::Mutex;

    #[test]
    fn test_missing_payload_is_invocation_error() {
        assert!(matches!(
            parse_validator_payload(None),
            Err(AppError::ValidatorInvocation(_))
        ));
        assert!(matches!(
            parse_validator_payload(Some(Vec::new())),
            Err(AppError::ValidatorInvocation(_))
        ));
    }

    #[test]
    fn test_malformed_payload_reports_text() {
        let err = parse_validator_payload(Some(b"<html>oops</html>".to_vec())).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validator invocation failed: Validator payload JSON parse error: <html>oops</html>"
        );
    }

    #[test]
    fn test_payload_status_is_normalized() -> anyhow::Result<()> {
        let result = parse_validator_payload(Some(
            br#"{"status": "ok", "message": "fine"}"#.to_vec(),
        ))?;
        assert_eq!(result, ValidationResult::successful("fine"));

        let result = parse_validator_payload(Some(br#"{"message": "no status"}"#.to_vec()))?;
        assert_eq!(result.status, ValidationStatus::Failed);
        Ok(())
    }

    #[test]
    fn test_function_error_message_falls_back_to_raw_text() {
        assert_eq!(
            function_error_message("Unhandled", Some(br#"{"errorType":"Error","errorMessage":"boom"}"#)),
            "boom"
        );
        assert_eq!(
            function_error_message("Unhandled", Some(b"Task timed out")),
            "Task timed out"
        );
        assert_eq!(
            function_error_message("Handled", None),
            "validator function error (Handled)"
        );
    }

    /// What the fake Lambda endpoint received: invocation type header and body.
    type Captured = Arc<Mutex<Vec<(Option<String>, Vec<u8>)>>>;

    fn lambda_client(function_error: Option<&'static str>, body: &'static str) -> (lambda::Client, Captured) {
        let captured: Captured = Arc::default();
        let seen = captured.clone();
        let http_client = infallible_client_fn(move |request| {
            let invocation_type = request
                .headers()
                .get("x-amz-invocation-type")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let sent = request.body().bytes().map(<[u8]>::to_vec).unwrap_or_default();
            seen.lock().unwrap().push((invocation_type, sent));

            let mut response = http::Response::builder().status(200);
            if let Some(kind) = function_error {
                response = response.header("X-Amz-Function-Error", kind);
            }
            response.body(body.to_string()).unwrap()
        });
        let config = lambda::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .http_client(http_client)
            .build();
        (lambda::Client::from_conf(config), captured)
    }

    fn s3_request() -> ValidationRequest {
        ValidationRequest {
            restore_job_id: "job-1".into(),
            recovery_point_arn: "arn:rp:1".into(),
            resource_type: "S3".into(),
            target_bucket: Some("restored".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lambda_reply_is_parsed_and_normalized() -> anyhow::Result<()> {
        let (client, captured) =
            lambda_client(None, r#"{"status": "Success", "message": "Found 3 objects (>= 1)"}"#);
        let validator = LambdaValidatorClient::new(client, "validator");

        let result = validator.validate(&s3_request()).await?;
        assert_eq!(result, ValidationResult::successful("Found 3 objects (>= 1)"));

        let captured = captured.lock().unwrap().clone();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0.as_deref(), Some("RequestResponse"));
        let sent: Value = serde_json::from_slice(&captured[0].1)?;
        assert_eq!(sent["restoreJobId"], "job-1");
        assert_eq!(sent["targetBucket"], "restored");
        Ok(())
    }

    #[tokio::test]
    async fn test_lambda_function_error_becomes_failed_result() -> anyhow::Result<()> {
        let (client, _) = lambda_client(
            Some("Unhandled"),
            r#"{"errorType":"Error","errorMessage":"boom"}"#,
        );
        let validator = LambdaValidatorClient::new(client, "validator");

        let result = validator.validate(&s3_request()).await?;
        assert_eq!(result, ValidationResult::failed("Unhandled validator error: boom"));
        Ok(())
    }

    #[tokio::test]
    async fn test_lambda_empty_reply_is_invocation_error() {
        let (client, _) = lambda_client(None, "");
        let validator = LambdaValidatorClient::new(client, "validator");

        let err = validator.validate(&s3_request()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validator invocation failed: Validator returned no payload"
        );
    }

    struct StaticSource(&'static str);

    #[async_trait]
    impl ParameterSource for StaticSource {
        async fn get_parameter(&self, _name: &str) -> Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    struct UnreachableSource;

    #[async_trait]
    impl ParameterSource for UnreachableSource {
        async fn get_parameter(&self, _name: &str) -> Result<Option<String>> {
            Err(AppError::aws(
                "GetParameter",
                std::io::Error::other("ParameterNotFound"),
            ))
        }
    }

    fn local_client(source: Arc<dyn ParameterSource>) -> LocalValidatorClient<FakeObjectStore> {
        LocalValidatorClient::new(
            Dispatcher::new(FakeObjectStore::with_keys(&["a"])),
            Arc::new(ConfigLoader::new(source, Some("/dr/validation".into()))),
        )
    }

    #[tokio::test]
    async fn test_local_client_returns_dispatch_result() -> anyhow::Result<()> {
        let client = local_client(Arc::new(StaticSource(r#"{"s3": {"buckets": ["restored"]}}"#)));
        let request = ValidationRequest {
            expected_keys: Some(vec!["a".into(), "b".into()]),
            ..s3_request()
        };

        let result = client.validate(&request).await?;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.message, "Missing 1 objects");
        assert_eq!(result.missing, Some(vec!["b".to_string()]));
        Ok(())
    }

    #[tokio::test]
    async fn test_local_client_reports_config_failures_as_failed() -> anyhow::Result<()> {
        let result = local_client(Arc::new(UnreachableSource))
            .validate(&s3_request())
            .await?;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.message.starts_with("Unhandled validator error: "));
        assert!(result.message.contains("ParameterNotFound"));

        let result = local_client(Arc::new(StaticSource("{not json")))
            .validate(&s3_request())
            .await?;
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.message.contains("Invalid validation config JSON"));
        Ok(())
    }
}
