// restorecheck/src/validation/result.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest message the restore-validation audit API accepts from us.
pub const MAX_PUBLISHED_MESSAGE_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Successful,
    Failed,
    Skipped,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Successful => "SUCCESSFUL",
            ValidationStatus::Failed => "FAILED",
            ValidationStatus::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a validator-reported status onto the canonical tri-state.
///
/// Matching is case-insensitive. Anything outside the known synonym sets,
/// including a missing status, fails closed.
pub fn map_status(raw: Option<&str>) -> ValidationStatus {
    let Some(raw) = raw else {
        return ValidationStatus::Failed;
    };
    match raw.to_ascii_uppercase().as_str() {
        "SUCCESS" | "SUCCESSFUL" | "OK" => ValidationStatus::Successful,
        "FAILED" | "FAIL" | "ERROR" => ValidationStatus::Failed,
        "SKIPPED" | "IGNORE" | "IGNORED" => ValidationStatus::Skipped,
        _ => ValidationStatus::Failed,
    }
}

/// Cuts a message down to what the audit API will store.
pub fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_PUBLISHED_MESSAGE_CHARS).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl ValidationResult {
    pub fn successful(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Successful,
            message: message.into(),
            missing: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
            missing: None,
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Skipped,
            message: message.into(),
            missing: None,
        }
    }

    pub fn with_missing(mut self, missing: Vec<String>) -> Self {
        self.missing = Some(missing);
        self
    }
}

/// What a validator function hands back over the wire, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl ValidatorResponse {
    pub fn normalize(self) -> ValidationResult {
        ValidationResult {
            status: map_status(self.status.as_deref()),
            message: self.message.unwrap_or_default(),
            missing: self.missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_status_is_case_insensitive() {
        assert_eq!(map_status(Some("successful")), ValidationStatus::Successful);
        assert_eq!(map_status(Some("SUCCESSFUL")), ValidationStatus::Successful);
        assert_eq!(map_status(Some("Ok")), ValidationStatus::Successful);
        assert_eq!(map_status(Some("success")), ValidationStatus::Successful);
        assert_eq!(map_status(Some("fail")), ValidationStatus::Failed);
        assert_eq!(map_status(Some("Error")), ValidationStatus::Failed);
        assert_eq!(map_status(Some("ignored")), ValidationStatus::Skipped);
        assert_eq!(map_status(Some("IGNORE")), ValidationStatus::Skipped);
    }

    #[test]
    fn test_map_status_fails_closed() {
        assert_eq!(map_status(None), ValidationStatus::Failed);
        assert_eq!(map_status(Some("")), ValidationStatus::Failed);
        assert_eq!(map_status(Some("PASSED")), ValidationStatus::Failed);
        assert_eq!(map_status(Some("TIMED_OUT")), ValidationStatus::Failed);
    }

    #[test]
    fn test_map_status_is_idempotent() {
        for raw in ["ok", "Skipped", "whatever", "FAIL", "successful"] {
            let once = map_status(Some(raw));
            assert_eq!(map_status(Some(once.as_str())), once);
        }
    }

    #[test]
    fn test_truncate_message_counts_chars() {
        let long = "é".repeat(1500);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.chars().count(), MAX_PUBLISHED_MESSAGE_CHARS);
        assert_eq!(truncate_message("short"), "short");
    }

    #[test]
    fn test_response_normalizes_loose_payload() -> anyhow::Result<()> {
        let response: ValidatorResponse =
            serde_json::from_value(json!({"status": "ok", "extra": 42}))?;
        let result = response.normalize();
        assert_eq!(result.status, ValidationStatus::Successful);
        assert_eq!(result.message, "");
        assert_eq!(result.missing, None);
        Ok(())
    }

    #[test]
    fn test_result_serializes_canonical_status() -> anyhow::Result<()> {
        let result = ValidationResult::failed("Missing 1 objects").with_missing(vec!["b".into()]);
        let value = serde_json::to_value(&result)?;
        assert_eq!(
            value,
            json!({"status": "FAILED", "message": "Missing 1 objects", "missing": ["b"]})
        );
        Ok(())
    }
}
