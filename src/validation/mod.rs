pub(crate) mod dispatcher;
pub(crate) mod request;
pub(crate) mod result;
pub(crate) mod s3_objects;

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::config::validation::{ConfigLoader, SsmParameterSource};
use crate::restore::validator_client::{LocalValidatorClient, ValidatorClient};
use crate::utils::aws::{load_sdk_config, s3_client};
use dispatcher::Dispatcher;
use request::ValidationRequest;
use result::ValidationResult;
use s3_objects::{AwsObjectStore, check_bucket_objects};

/// Validates one restored resource in-process, the way a deployed validator would.
pub async fn run_validate_flow(app_config: &AppConfig, event: Value) -> Result<ValidationResult> {
    let request = ValidationRequest::from_event(event).context("Invalid validation request")?;
    let sdk_config = load_sdk_config(&app_config.aws).await;

    let loader = ConfigLoader::new(
        Arc::new(SsmParameterSource::new(aws_sdk_ssm::Client::new(&sdk_config))),
        app_config.validation_config_parameter.clone(),
    );
    let dispatcher = Dispatcher::new(AwsObjectStore::new(s3_client(&sdk_config, &app_config.aws)));
    let validator = LocalValidatorClient::new(dispatcher, Arc::new(loader));
    Ok(validator.validate(&request).await?)
}

/// Runs only the object-store presence check against the request's bucket.
pub async fn run_object_check_flow(app_config: &AppConfig, event: Value) -> Result<ValidationResult> {
    let request = ValidationRequest::from_event(event).context("Invalid validation request")?;
    let sdk_config = load_sdk_config(&app_config.aws).await;
    let store = AwsObjectStore::new(s3_client(&sdk_config, &app_config.aws));

    let result = check_bucket_objects(
        &store,
        request.requested_bucket(),
        request.expected_keys.as_deref(),
        request.expected_min_objects,
    )
    .await?;
    Ok(result)
}
