//! Storage drivers: where bundles are mirrored and where versions are discovered.

pub mod failure;
pub mod local;
pub mod mirror;
pub mod object_store;
pub mod provider;
pub mod remote;
pub mod retry;
pub mod s3;

pub use failure::{NetworkCause, ProviderFailure, RetryClass, classify};
pub use local::LocalDriver;
pub use mirror::MirrorStore;
pub use object_store::{MAX_DELETE_BATCH, ObjectStore};
pub use remote::{RemoteDriver, RemoteLayout};
pub use retry::RetryPolicy;
pub use s3::S3Store;

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, DriverKind};
use crate::error::Result;
use crate::version::VersionId;

/// Outcome of mirroring one version to the secondary store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// True when the driver had nothing to mirror to
    pub skipped: bool,
    pub objects_deleted: u64,
    pub objects_uploaded: u64,
    pub bytes_uploaded: u64,
    pub retries: u32,
}

/// The storage backend, selected once at startup
pub enum StorageDriver {
    Local(LocalDriver),
    Remote(RemoteDriver),
}

impl StorageDriver {
    /// Build the driver named by the configuration.
    ///
    /// The remote driver uses the mock mirror directory when one is set, and
    /// otherwise requires a complete S3 configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        match config.driver {
            DriverKind::Local => Ok(StorageDriver::Local(LocalDriver::new(
                &config.upload_root,
                config.legacy_publish_root.clone(),
            ))),
            DriverKind::Remote => {
                let remote = &config.remote;
                let store: Arc<dyn ObjectStore> = match &remote.mock_dir {
                    Some(dir) => {
                        info!(dir = %dir.display(), "remote storage mocked by local mirror");
                        Arc::new(MirrorStore::new(dir))
                    }
                    None => {
                        let client = provider::create_s3_client(remote).await?;
                        let bucket = remote.bucket.clone().unwrap_or_default();
                        info!(bucket = %bucket, "remote storage on s3");
                        Arc::new(S3Store::new(client, bucket))
                    }
                };
                let layout = RemoteLayout {
                    prefix: remote.prefix.clone(),
                    legacy_prefix: remote
                        .mirror_legacy
                        .then(|| remote.legacy_prefix.clone()),
                };
                Ok(StorageDriver::Remote(RemoteDriver::new(store, layout, remote.retry)))
            }
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StorageDriver::Local(_) => "local",
            StorageDriver::Remote(driver) => driver.store_name(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StorageDriver::Remote(_))
    }

    /// Mirror `source_dir` for `version`; the local driver has nothing to do
    pub async fn sync(&self, platform: &str, version: &VersionId, source_dir: &Path) -> Result<SyncReport> {
        match self {
            StorageDriver::Local(_) => Ok(SyncReport {
                skipped: true,
                ..SyncReport::default()
            }),
            StorageDriver::Remote(driver) => driver.sync(platform, version, source_dir).await,
        }
    }

    /// Versions that exist in storage, oldest first
    pub async fn list_versions(&self, platform: &str) -> Result<Vec<VersionId>> {
        match self {
            StorageDriver::Local(driver) => driver.list_versions().await,
            StorageDriver::Remote(driver) => driver.list_versions(platform).await,
        }
    }

    pub async fn contains(&self, platform: &str, version: &VersionId) -> Result<bool> {
        Ok(self.list_versions(platform).await?.contains(version))
    }
}
