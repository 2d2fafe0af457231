pub(crate) mod backup_service;
pub(crate) mod logic;
pub(crate) mod metadata;
pub(crate) mod model;
pub(crate) mod validator_client;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::validation::{ConfigLoader, SsmParameterSource};
use crate::config::{AppConfig, load_orchestrator_config};
use crate::utils::aws::{load_sdk_config, s3_client};
use crate::utils::clock::TokioClock;
use crate::validation::dispatcher::Dispatcher;
use crate::validation::s3_objects::AwsObjectStore;
use backup_service::AwsBackupService;
use logic::RestoreOrchestrator;
use model::{OrchestrationResult, Trigger};
use validator_client::{LambdaValidatorClient, LocalValidatorClient, ValidatorClient};

/// Public entry point for a restore test run.
///
/// Uses the configured validator Lambda when there is one, otherwise validates
/// in-process with the built-in dispatcher.
pub async fn run_restore_flow(app_config: &AppConfig, trigger: Trigger) -> Result<OrchestrationResult> {
    let orchestrator_config = load_orchestrator_config(&app_config.raw_json_config)
        .context("Failed to load orchestrator configuration")?;
    let sdk_config = load_sdk_config(&app_config.aws).await;
    let backup = AwsBackupService::new(aws_sdk_backup::Client::new(&sdk_config));

    match &app_config.validator_function {
        Some(function_name) => {
            info!(function = function_name.as_str(), "Validating through Lambda");
            let validator =
                LambdaValidatorClient::new(aws_sdk_lambda::Client::new(&sdk_config), function_name.clone());
            orchestrate(backup, validator, orchestrator_config, trigger).await
        }
        None => {
            info!("No validator function configured, validating in-process");
            let loader = ConfigLoader::new(
                Arc::new(SsmParameterSource::new(aws_sdk_ssm::Client::new(&sdk_config))),
                app_config.validation_config_parameter.clone(),
            );
            let dispatcher = Dispatcher::new(AwsObjectStore::new(s3_client(&sdk_config, &app_config.aws)));
            let validator = LocalValidatorClient::new(dispatcher, Arc::new(loader));
            orchestrate(backup, validator, orchestrator_config, trigger).await
        }
    }
}

async fn orchestrate<V: ValidatorClient>(
    backup: AwsBackupService,
    validator: V,
    config: crate::config::OrchestratorConfig,
    trigger: Trigger,
) -> Result<OrchestrationResult> {
    let orchestrator = RestoreOrchestrator::new(backup, validator, TokioClock::new(), config);
    Ok(orchestrator.run(trigger).await?)
}
