use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No recovery points found in vault {vault}")]
    NoRecoveryPoint { vault: String },

    #[error("StartRestoreJob returned no RestoreJobId for recovery point {recovery_point_arn}")]
    RestoreStart { recovery_point_arn: String },

    #[error("Restore job {restore_job_id} did not finish within {} seconds", .timeout.as_secs())]
    RestoreTimeout {
        restore_job_id: String,
        timeout: Duration,
    },

    #[error("StartCopyJob returned no CopyJobId for recovery point {recovery_point_arn}")]
    CopyStart { recovery_point_arn: String },

    #[error("Copy job {copy_job_id} failed: {reason}")]
    CopyFailed { copy_job_id: String, reason: String },

    #[error("Copy job {copy_job_id} did not finish within {} seconds", .timeout.as_secs())]
    CopyTimeout {
        copy_job_id: String,
        timeout: Duration,
    },

    #[error("Validator invocation failed: {0}")]
    ValidatorInvocation(String),

    #[error("Validator error: {0}")]
    ValidatorRuntime(String),

    #[error("AWS {operation} call failed: {source}")]
    Aws {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl AppError {
    /// Wraps an SDK failure, keeping the name of the API operation that produced it.
    pub fn aws<E>(operation: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AppError::Aws {
            operation,
            source: Box::new(err),
        }
    }

    /// Process exit code reported by the CLI for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) => 2,
            AppError::NoRecoveryPoint { .. } => 3,
            AppError::RestoreStart { .. } | AppError::CopyStart { .. } => 4,
            AppError::RestoreTimeout { .. } | AppError::CopyTimeout { .. } => 5,
            AppError::ValidatorInvocation(_) | AppError::ValidatorRuntime(_) => 6,
            AppError::Aws { .. } => 7,
            AppError::CopyFailed { .. } => 8,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
