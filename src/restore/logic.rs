// restorecheck/src/restore/logic.rs
use std::future::Future;
use tracing::{info, warn};
use uuid::Uuid;

use super::backup_service::BackupService;
use super::model::{
    CopyJob, CopyJobState, OrchestrationResult, RestoreJob, RestoreJobStatus, Stage,
    StartCopyRequest, StartRestoreRequest, Trigger, latest_recovery_point,
};
use super::validator_client::ValidatorClient;
use crate::config::{CopySettings, OrchestratorConfig};
use crate::errors::{AppError, Result};
use crate::utils::clock::Clock;
use crate::validation::request::{S3Context, ValidationRequest};
use crate::validation::result::{ValidationResult, truncate_message};

/// How many recovery points are considered when picking the latest one.
pub const RECOVERY_POINT_PAGE_SIZE: i32 = 20;

/// Drives one restore test end to end. Holds no state between runs.
pub struct RestoreOrchestrator<B, V, C> {
    backup: B,
    validator: V,
    clock: C,
    config: OrchestratorConfig,
}

impl<B, V, C> RestoreOrchestrator<B, V, C>
where
    B: BackupService,
    V: ValidatorClient,
    C: Clock,
{
    pub fn new(backup: B, validator: V, clock: C, config: OrchestratorConfig) -> Self {
        Self {
            backup,
            validator,
            clock,
            config,
        }
    }

    pub async fn run(&self, trigger: Trigger) -> Result<OrchestrationResult> {
        info!(
            vault = self.config.backup_vault_name.as_str(),
            resource_type = self.config.resource_type.as_str(),
            recovery_point_arn = trigger.recovery_point_arn.as_deref().unwrap_or(""),
            restore_job_id = trigger.restore_job_id.as_deref().unwrap_or(""),
            "Restore orchestration start"
        );

        // Empty strings in the trigger count as absent.
        let requested_point = trigger.recovery_point_arn.filter(|arn| !arn.is_empty());
        let (restore_job_id, recovery_point_arn) = match trigger.restore_job_id.filter(|id| !id.is_empty()) {
            Some(job_id) => {
                info!(restore_job_id = job_id.as_str(), "Monitoring existing restore job");
                (job_id, requested_point)
            }
            None => {
                let selected = match requested_point {
                    Some(arn) => arn,
                    None => self.pick_latest_recovery_point().await?,
                };
                info!(stage = %Stage::SelectingRecoveryPoint, recovery_point_arn = selected.as_str(), "Recovery point selected");
                let recovery_point_arn = match &self.config.copy {
                    Some(copy) => self.copy_recovery_point(copy, &selected).await?,
                    None => selected,
                };
                let job_id = self.start_restore(&recovery_point_arn).await?;
                (job_id, Some(recovery_point_arn))
            }
        };

        let job = self.wait_for_completion(&restore_job_id).await?;
        let recovery_point_arn = recovery_point_arn
            .or_else(|| job.recovery_point_arn.clone())
            .unwrap_or_default();

        if job.status != RestoreJobStatus::Completed {
            // Every terminal job gets a published verdict.
            warn!(
                restore_job_id = restore_job_id.as_str(),
                status = %job.status,
                status_message = job.status_message.as_deref().unwrap_or(""),
                "Restore job did not complete successfully, validating anyway"
            );
        }

        let request = self.build_validation_request(&restore_job_id, &recovery_point_arn, &job);
        let validation = self.invoke_validator(&request).await?;

        self.publish_validation(&restore_job_id, &validation).await?;
        info!(
            stage = %Stage::Done,
            restore_job_id = restore_job_id.as_str(),
            status = %validation.status,
            "Restore orchestration finished"
        );

        Ok(OrchestrationResult {
            restore_job_id,
            recovery_point_arn,
            validation,
        })
    }

    async fn pick_latest_recovery_point(&self) -> Result<String> {
        let vault = &self.config.backup_vault_name;
        info!(stage = %Stage::SelectingRecoveryPoint, vault = vault.as_str(), "Listing recovery points");
        let points = self
            .backup
            .list_recovery_points(vault, RECOVERY_POINT_PAGE_SIZE)
            .await?;
        latest_recovery_point(&points)
            .map(|point| point.arn.clone())
            .ok_or_else(|| AppError::NoRecoveryPoint {
                vault: vault.clone(),
            })
    }

    /// Copies the recovery point into the configured vault and returns the copy's ARN.
    async fn copy_recovery_point(&self, copy: &CopySettings, recovery_point_arn: &str) -> Result<String> {
        let request = StartCopyRequest {
            recovery_point_arn: recovery_point_arn.to_string(),
            source_vault_name: self.config.backup_vault_name.clone(),
            destination_vault_arn: copy.destination_vault_arn.clone(),
            iam_role_arn: copy
                .iam_role_arn
                .clone()
                .or_else(|| self.config.restore_role_arn.clone()),
            idempotency_token: Uuid::new_v4().to_string(),
        };
        info!(
            stage = %Stage::CopyingRecoveryPoint,
            recovery_point_arn,
            destination_vault_arn = request.destination_vault_arn.as_str(),
            "Starting copy job"
        );
        let copy_job_id = self
            .backup
            .start_copy_job(&request)
            .await?
            .ok_or_else(|| AppError::CopyStart {
                recovery_point_arn: recovery_point_arn.to_string(),
            })?;

        let id = copy_job_id.as_str();
        let job = self
            .poll_until(
                move |checks| async move {
                    let job = self.backup.describe_copy_job(id).await?;
                    info!(
                        stage = %Stage::CopyingRecoveryPoint,
                        copy_job_id = id,
                        state = %job.state,
                        checks,
                        "Polled copy job"
                    );
                    Ok::<_, AppError>(job)
                },
                |job: &CopyJob| job.state.is_terminal(),
            )
            .await?
            .ok_or_else(|| AppError::CopyTimeout {
                copy_job_id: copy_job_id.clone(),
                timeout: self.config.restore_timeout,
            })?;

        if job.state != CopyJobState::Completed {
            return Err(AppError::CopyFailed {
                copy_job_id,
                reason: format!(
                    "{}: {}",
                    job.state,
                    job.status_message.as_deref().unwrap_or("no status message")
                ),
            });
        }
        let copied = job
            .destination_recovery_point_arn
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| AppError::CopyFailed {
                copy_job_id: copy_job_id.clone(),
                reason: "no destination recovery point reported".to_string(),
            })?;
        info!(copy_job_id = copy_job_id.as_str(), recovery_point_arn = copied.as_str(), "Recovery point copied");
        Ok(copied)
    }

    async fn start_restore(&self, recovery_point_arn: &str) -> Result<String> {
        let request = StartRestoreRequest {
            recovery_point_arn: recovery_point_arn.to_string(),
            resource_type: self.config.resource_type.clone(),
            iam_role_arn: self.config.restore_role_arn.clone(),
            metadata: self.config.restore_metadata.clone(),
            idempotency_token: Uuid::new_v4().to_string(),
            copy_source_tags: self.config.copy_source_tags,
        };
        info!(
            stage = %Stage::StartingRestore,
            recovery_point_arn,
            idempotency_token = request.idempotency_token.as_str(),
            "Starting restore job"
        );

        let restore_job_id = self
            .backup
            .start_restore_job(&request)
            .await?
            .ok_or_else(|| AppError::RestoreStart {
                recovery_point_arn: recovery_point_arn.to_string(),
            })?;
        info!(restore_job_id = restore_job_id.as_str(), "Restore job started");
        Ok(restore_job_id)
    }

    /// Polls at a fixed interval until the job reaches a terminal status.
    async fn wait_for_completion(&self, restore_job_id: &str) -> Result<RestoreJob> {
        self.poll_until(
            move |checks| async move {
                let job = self.backup.describe_restore_job(restore_job_id).await?;
                info!(
                    stage = %Stage::Polling,
                    restore_job_id,
                    status = %job.status,
                    percent_done = job.percent_done.as_deref().unwrap_or("0.00%"),
                    checks,
                    "Polled restore job"
                );
                Ok::<_, AppError>(job)
            },
            |job: &RestoreJob| job.status.is_terminal(),
        )
        .await?
        .ok_or_else(|| AppError::RestoreTimeout {
            restore_job_id: restore_job_id.to_string(),
            timeout: self.config.restore_timeout,
        })
    }

    /// Calls `describe` every poll interval until `finished` accepts a snapshot.
    /// `None` means the timeout ran out first.
    async fn poll_until<T, F, Fut>(&self, mut describe: F, finished: impl Fn(&T) -> bool) -> Result<Option<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = self.clock.elapsed();
        let mut checks = 0u32;

        while self.clock.elapsed().saturating_sub(started) < self.config.restore_timeout {
            checks += 1;
            let snapshot = describe(checks).await?;
            if finished(&snapshot) {
                return Ok(Some(snapshot));
            }
            self.clock.sleep(self.config.poll_interval).await;
        }
        Ok(None)
    }

    fn build_validation_request(
        &self,
        restore_job_id: &str,
        recovery_point_arn: &str,
        job: &RestoreJob,
    ) -> ValidationRequest {
        let target_bucket = self.config.target_bucket.clone();
        ValidationRequest {
            restore_job_id: restore_job_id.to_string(),
            recovery_point_arn: recovery_point_arn.to_string(),
            resource_type: self.config.resource_type.clone(),
            created_resource_arn: job.created_resource_arn.clone(),
            s3: Some(S3Context {
                bucket: target_bucket.clone(),
            }),
            target_bucket,
            expected_keys: None,
            expected_min_objects: None,
        }
    }

    async fn invoke_validator(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        info!(
            stage = %Stage::Validating,
            restore_job_id = request.restore_job_id.as_str(),
            created_resource_arn = request.created_resource_arn.as_deref().unwrap_or(""),
            "Invoking validator"
        );
        let result = self.validator.validate(request).await?;
        info!(status = %result.status, message = result.message.as_str(), "Validator returned");
        Ok(result)
    }

    async fn publish_validation(&self, restore_job_id: &str, result: &ValidationResult) -> Result<()> {
        let message = truncate_message(&result.message);
        info!(
            stage = %Stage::Publishing,
            restore_job_id,
            status = %result.status,
            message_chars = message.chars().count(),
            "Publishing validation result"
        );
        self.backup
            .put_restore_validation_result(restore_job_id, result.status, &message)
            .await
    }
}
