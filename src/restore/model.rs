// restorecheck/src/restore/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::validation::result::ValidationResult;

/// A snapshot in the backup vault that a restore can start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPoint {
    pub arn: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// Picks the most recent recovery point.
///
/// Points without a creation date sort as the epoch. Among equal creation
/// dates the lexicographically greatest ARN wins, so the pick is stable for
/// any listing order.
pub fn latest_recovery_point(points: &[RecoveryPoint]) -> Option<&RecoveryPoint> {
    points.iter().max_by(|a, b| {
        let a_key = a.creation_date.unwrap_or(DateTime::UNIX_EPOCH);
        let b_key = b.creation_date.unwrap_or(DateTime::UNIX_EPOCH);
        a_key.cmp(&b_key).then_with(|| a.arn.cmp(&b.arn))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreJobStatus {
    Pending,
    Running,
    Completed,
    Aborted,
    Failed,
    Unknown(String),
}

impl RestoreJobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PENDING" => RestoreJobStatus::Pending,
            "RUNNING" => RestoreJobStatus::Running,
            "COMPLETED" => RestoreJobStatus::Completed,
            "ABORTED" => RestoreJobStatus::Aborted,
            "FAILED" => RestoreJobStatus::Failed,
            other => RestoreJobStatus::Unknown(other.to_string()),
        }
    }

    /// COMPLETED, ABORTED and FAILED end polling.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RestoreJobStatus::Completed | RestoreJobStatus::Aborted | RestoreJobStatus::Failed
        )
    }
}

impl fmt::Display for RestoreJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreJobStatus::Pending => f.write_str("PENDING"),
            RestoreJobStatus::Running => f.write_str("RUNNING"),
            RestoreJobStatus::Completed => f.write_str("COMPLETED"),
            RestoreJobStatus::Aborted => f.write_str("ABORTED"),
            RestoreJobStatus::Failed => f.write_str("FAILED"),
            RestoreJobStatus::Unknown(other) => f.write_str(other),
        }
    }
}

/// Snapshot of a restore job as reported by DescribeRestoreJob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreJob {
    pub restore_job_id: String,
    pub status: RestoreJobStatus,
    pub recovery_point_arn: Option<String>,
    pub created_resource_arn: Option<String>,
    pub status_message: Option<String>,
    pub percent_done: Option<String>,
}

/// Parameters for StartRestoreJob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRestoreRequest {
    pub recovery_point_arn: String,
    pub resource_type: String,
    pub iam_role_arn: Option<String>,
    pub metadata: std::collections::HashMap<String, String>,
    pub idempotency_token: String,
    pub copy_source_tags: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyJobState {
    Created,
    Running,
    Completed,
    Failed,
    Aborted,
    Partial,
    Unknown(String),
}

impl CopyJobState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "CREATED" => CopyJobState::Created,
            "RUNNING" => CopyJobState::Running,
            "COMPLETED" => CopyJobState::Completed,
            "FAILED" => CopyJobState::Failed,
            "ABORTED" => CopyJobState::Aborted,
            "PARTIAL" => CopyJobState::Partial,
            other => CopyJobState::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CopyJobState::Completed
                | CopyJobState::Failed
                | CopyJobState::Aborted
                | CopyJobState::Partial
        )
    }
}

impl fmt::Display for CopyJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyJobState::Created => f.write_str("CREATED"),
            CopyJobState::Running => f.write_str("RUNNING"),
            CopyJobState::Completed => f.write_str("COMPLETED"),
            CopyJobState::Failed => f.write_str("FAILED"),
            CopyJobState::Aborted => f.write_str("ABORTED"),
            CopyJobState::Partial => f.write_str("PARTIAL"),
            CopyJobState::Unknown(other) => f.write_str(other),
        }
    }
}

/// Snapshot of a copy job as reported by DescribeCopyJob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJob {
    pub copy_job_id: String,
    pub state: CopyJobState,
    pub status_message: Option<String>,
    pub destination_recovery_point_arn: Option<String>,
}

/// Parameters for StartCopyJob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCopyRequest {
    pub recovery_point_arn: String,
    pub source_vault_name: String,
    pub destination_vault_arn: String,
    pub iam_role_arn: Option<String>,
    pub idempotency_token: String,
}

/// What starts an orchestration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    #[serde(default)]
    pub recovery_point_arn: Option<String>,
    /// Track an already running restore job instead of starting one.
    #[serde(default)]
    pub restore_job_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub restore_job_id: String,
    pub recovery_point_arn: String,
    pub validation: ValidationResult,
}

/// Orchestration stages, in order. Used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectingRecoveryPoint,
    CopyingRecoveryPoint,
    StartingRestore,
    Polling,
    Validating,
    Publishing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::SelectingRecoveryPoint => "selecting_recovery_point",
            Stage::CopyingRecoveryPoint => "copying_recovery_point",
            Stage::StartingRestore => "starting_restore",
            Stage::Polling => "polling",
            Stage::Validating => "validating",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}
