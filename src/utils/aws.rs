// restorecheck/src/utils/aws.rs
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::{Credentials, Region};
use tracing::debug;

use crate::config::AwsSettings;

/// Loads the shared SDK configuration every service client is built from.
///
/// Unset fields fall through to the default provider chain (environment,
/// profile, instance metadata).
pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(region) = &settings.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(profile) = &settings.profile {
        loader = loader.profile_name(profile);
    }
    if let Some(endpoint_url) = &settings.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    if let Some(credentials) = &settings.credentials {
        loader = loader.credentials_provider(Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None, // session_token
            None, // expiry
            "Static", // provider_name
        ));
    }

    let sdk_config = loader.load().await;
    debug!(
        region = ?sdk_config.region(),
        endpoint = settings.endpoint_url.as_deref().unwrap_or("<default>"),
        "Loaded AWS SDK configuration"
    );
    sdk_config
}

/// S3 client for the restored buckets. Custom endpoints (LocalStack, MinIO)
/// need path-style addressing.
pub fn s3_client(sdk_config: &SdkConfig, settings: &AwsSettings) -> aws_sdk_s3::Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(settings.endpoint_url.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
