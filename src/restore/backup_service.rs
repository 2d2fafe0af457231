// restorecheck/src/restore/backup_service.rs
use async_trait::async_trait;
use aws_sdk_backup as backup;
use backup::types::RestoreValidationStatus;
use chrono::DateTime;

use super::model::{
    CopyJob, CopyJobState, RecoveryPoint, RestoreJob, RestoreJobStatus, StartCopyRequest,
    StartRestoreRequest,
};
use crate::errors::{AppError, Result};
use crate::validation::result::ValidationStatus;

/// The slice of the AWS Backup API a restore test needs.
#[async_trait]
pub trait BackupService: Send + Sync {
    async fn list_recovery_points(&self, vault: &str, max_results: i32)
    -> Result<Vec<RecoveryPoint>>;

    /// Returns the new copy job id, or `None` if the service sent none back.
    async fn start_copy_job(&self, request: &StartCopyRequest) -> Result<Option<String>>;

    async fn describe_copy_job(&self, copy_job_id: &str) -> Result<CopyJob>;

    /// Returns the new restore job id, or `None` if the service sent none back.
    async fn start_restore_job(&self, request: &StartRestoreRequest) -> Result<Option<String>>;

    async fn describe_restore_job(&self, restore_job_id: &str) -> Result<RestoreJob>;

    async fn put_restore_validation_result(
        &self,
        restore_job_id: &str,
        status: ValidationStatus,
        message: &str,
    ) -> Result<()>;
}

pub struct AwsBackupService {
    client: backup::Client,
}

impl AwsBackupService {
    pub fn new(client: backup::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BackupService for AwsBackupService {
    async fn list_recovery_points(
        &self,
        vault: &str,
        max_results: i32,
    ) -> Result<Vec<RecoveryPoint>> {
        let output = self
            .client
            .list_recovery_points_by_backup_vault()
            .backup_vault_name(vault)
            .max_results(max_results)
            .send()
            .await
            .map_err(|e| AppError::aws("ListRecoveryPointsByBackupVault", e))?;

        Ok(output
            .recovery_points
            .unwrap_or_default()
            .into_iter()
            .filter_map(|rp| {
                let arn = rp.recovery_point_arn?;
                let creation_date = rp
                    .creation_date
                    .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()));
                Some(RecoveryPoint { arn, creation_date })
            })
            .collect())
    }

    async fn start_copy_job(&self, request: &StartCopyRequest) -> Result<Option<String>> {
        let output = self
            .client
            .start_copy_job()
            .recovery_point_arn(&request.recovery_point_arn)
            .source_backup_vault_name(&request.source_vault_name)
            .destination_backup_vault_arn(&request.destination_vault_arn)
            .set_iam_role_arn(request.iam_role_arn.clone())
            .idempotency_token(&request.idempotency_token)
            .send()
            .await
            .map_err(|e| AppError::aws("StartCopyJob", e))?;
        Ok(output.copy_job_id.filter(|id| !id.is_empty()))
    }

    async fn describe_copy_job(&self, copy_job_id: &str) -> Result<CopyJob> {
        let output = self
            .client
            .describe_copy_job()
            .copy_job_id(copy_job_id)
            .send()
            .await
            .map_err(|e| AppError::aws("DescribeCopyJob", e))?;

        let Some(job) = output.copy_job else {
            return Ok(CopyJob {
                copy_job_id: copy_job_id.to_string(),
                state: CopyJobState::Unknown(String::new()),
                status_message: None,
                destination_recovery_point_arn: None,
            });
        };
        Ok(CopyJob {
            copy_job_id: job.copy_job_id.unwrap_or_else(|| copy_job_id.to_string()),
            state: job
                .state
                .as_ref()
                .map(|s| CopyJobState::parse(s.as_str()))
                .unwrap_or_else(|| CopyJobState::Unknown(String::new())),
            status_message: job.status_message,
            destination_recovery_point_arn: job.destination_recovery_point_arn,
        })
    }

    async fn start_restore_job(&self, request: &StartRestoreRequest) -> Result<Option<String>> {
        let output = self
            .client
            .start_restore_job()
            .recovery_point_arn(&request.recovery_point_arn)
            .resource_type(&request.resource_type)
            .set_iam_role_arn(request.iam_role_arn.clone())
            .set_metadata(Some(request.metadata.clone()))
            .idempotency_token(&request.idempotency_token)
            .set_copy_source_tags_to_restored_resource(request.copy_source_tags.then_some(true))
            .send()
            .await
            .map_err(|e| AppError::aws("StartRestoreJob", e))?;
        Ok(output.restore_job_id.filter(|id| !id.is_empty()))
    }

    async fn describe_restore_job(&self, restore_job_id: &str) -> Result<RestoreJob> {
        let output = self
            .client
            .describe_restore_job()
            .restore_job_id(restore_job_id)
            .send()
            .await
            .map_err(|e| AppError::aws("DescribeRestoreJob", e))?;

        let status = output
            .status
            .as_ref()
            .map(|s| RestoreJobStatus::parse(s.as_str()))
            .unwrap_or_else(|| RestoreJobStatus::Unknown(String::new()));

        Ok(RestoreJob {
            restore_job_id: output
                .restore_job_id
                .unwrap_or_else(|| restore_job_id.to_string()),
            status,
            recovery_point_arn: output.recovery_point_arn,
            created_resource_arn: output.created_resource_arn,
            status_message: output.status_message,
            percent_done: output.percent_done,
        })
    }

    async fn put_restore_validation_result(
        &self,
        restore_job_id: &str,
        status: ValidationStatus,
        message: &str,
    ) -> Result<()> {
        self.client
            .put_restore_validation_result()
            .restore_job_id(restore_job_id)
            .validation_status(RestoreValidationStatus::from(status.as_str()))
            .validation_status_message(message)
            .send()
            .await
            .map_err(|e| AppError::aws("PutRestoreValidationResult", e))?;
        Ok(())
    }
}
