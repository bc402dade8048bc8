use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::{HotError, Result};

/// Build an S3 client from explicit remote settings.
///
/// Bucket, region and static credentials are required; a missing value
/// surfaces as `StorageConfigMissing` before any network call is made.
pub async fn create_s3_client(config: &RemoteConfig) -> Result<Client> {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        return Err(HotError::StorageConfigMissing(missing.join(", ")));
    }

    let region = config.region.clone().unwrap_or_default();
    let credentials = Credentials::new(
        config.access_key_id.clone().unwrap_or_default(),
        config.secret_access_key.clone().unwrap_or_default(),
        None,
        None,
        "hotver",
    );

    let base_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;

    // Build S3-specific config
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&base_config);

    if let Some(endpoint) = &config.endpoint_url {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    if config.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    debug!(
        region = %region,
        endpoint = config.endpoint_url.as_deref().unwrap_or("default"),
        path_style = config.force_path_style,
        "s3 client configured"
    );

    Ok(Client::from_conf(s3_config_builder.build()))
}
