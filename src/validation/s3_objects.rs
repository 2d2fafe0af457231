// restorecheck/src/validation/s3_objects.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use tracing::{debug, info, warn};

use super::result::ValidationResult;
use crate::errors::{AppError, Result};

/// Objects requested per ListObjectsV2 page.
pub const LIST_PAGE_SIZE: i32 = 1000;
pub const DEFAULT_MIN_OBJECTS: u64 = 1;

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub object_count: u64,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Read-only view of an object store, enough to check what a restore produced.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether `key` exists in `bucket`.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    async fn list_page(
        &self,
        bucket: &str,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<ListPage>;
}

pub struct AwsObjectStore {
    client: s3::Client,
}

impl AwsObjectStore {
    pub fn new(client: s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for AwsObjectStore {
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::aws("HeadObject", service_error))
                }
            }
        }
    }

    async fn list_page(
        &self,
        bucket: &str,
        max_keys: i32,
        continuation_token: Option<String>,
    ) -> Result<ListPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(max_keys)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(|e| AppError::aws("ListObjectsV2", e))?;

        Ok(ListPage {
            object_count: response.contents.map_or(0, |contents| contents.len() as u64),
            is_truncated: response.is_truncated.unwrap_or(false),
            next_continuation_token: response.next_continuation_token,
        })
    }
}

/// Checks that a restored bucket holds what we expect.
///
/// With a non-empty `expected_keys` every key is checked and all misses are
/// reported. Otherwise the listing is paged until `expected_min_objects`
/// (default 1) is reached or the bucket runs out of objects.
pub async fn check_bucket_objects<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: Option<&str>,
    expected_keys: Option<&[String]>,
    expected_min_objects: Option<u64>,
) -> Result<ValidationResult> {
    let Some(bucket) = bucket.filter(|b| !b.is_empty()) else {
        return Ok(ValidationResult::skipped("No bucket specified"));
    };

    if let Some(keys) = expected_keys.filter(|keys| !keys.is_empty()) {
        return check_expected_keys(store, bucket, keys).await;
    }

    let min = expected_min_objects.unwrap_or(DEFAULT_MIN_OBJECTS);
    let found = count_objects_up_to(store, bucket, min).await?;
    info!(bucket, found, min, "Counted restored objects");

    if found < min {
        return Ok(ValidationResult::failed(format!(
            "Only {} objects found (< {})",
            found, min
        )));
    }
    Ok(ValidationResult::successful(format!(
        "Found {} objects (>= {})",
        found, min
    )))
}

async fn check_expected_keys<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    keys: &[String],
) -> Result<ValidationResult> {
    let mut missing = Vec::new();
    for key in keys {
        match store.object_exists(bucket, key).await {
            Ok(true) => debug!(bucket, key = key.as_str(), "Expected object present"),
            Ok(false) => missing.push(key.clone()),
            // An object we cannot read back counts as missing.
            Err(e) => {
                warn!(bucket, key = key.as_str(), error = %e, "HeadObject failed, counting object as missing");
                missing.push(key.clone());
            }
        }
    }

    if !missing.is_empty() {
        info!(bucket, missing = missing.len(), expected = keys.len(), "Expected objects missing");
        return Ok(
            ValidationResult::failed(format!("Missing {} objects", missing.len()))
                .with_missing(missing),
        );
    }
    Ok(ValidationResult::successful(format!(
        "All {} expected objects present",
        keys.len()
    )))
}

async fn count_objects_up_to<S: ObjectStore + ?Sized>(
    store: &S,
    bucket: &str,
    min: u64,
) -> Result<u64> {
    let mut found = 0u64;
    let mut continuation_token = None;
    while found < min {
        let page = store
            .list_page(bucket, LIST_PAGE_SIZE, continuation_token.take())
            .await?;
        found += page.object_count;
        if !page.is_truncated {
            break;
        }
        match page.next_continuation_token {
            Some(token) => continuation_token = Some(token),
            None => {
                warn!(bucket, found, "Listing truncated without a continuation token, stopping");
                break;
            }
        }
    }
    Ok(found)
}
