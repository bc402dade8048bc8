//! Version lifecycle service: upload, publish/switch, register and listing.
//!
//! Every change to the current pointer happens inside the publish lock, and
//! the existence check runs inside that same critical section.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::archive::{ExtractReport, extract};
use crate::config::Config;
use crate::error::{HotError, Result};
use crate::lock::FileLock;
use crate::registry::{HistoryAction, HistoryEntry, Registry};
use crate::storage::{StorageDriver, SyncReport};
use crate::version::{VersionId, parse_upload_filename};

/// The two ways a version becomes current
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Publish,
    Switch,
}

impl From<PublishAction> for HistoryAction {
    fn from(action: PublishAction) -> Self {
        match action {
            PublishAction::Publish => HistoryAction::Publish,
            PublishAction::Switch => HistoryAction::Switch,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub platform: String,
    pub version: VersionId,
    pub overwrite: bool,
    pub extract: ExtractReport,
    pub sync: SyncReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub platform: String,
    pub version: VersionId,
    pub action: HistoryAction,
    pub already_current: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub platform: String,
    pub version: VersionId,
    pub overwrite: bool,
}

/// One row of the version listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: VersionId,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub current: bool,
    /// Present in the storage discovery listing
    pub in_storage: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutcome {
    pub platform: String,
    pub current_version: String,
    /// Newest first
    pub versions: Vec<VersionEntry>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentOutcome {
    pub platform: String,
    pub current_version: String,
}

pub struct VersionService {
    config: Config,
    storage: StorageDriver,
    registry: Registry,
    publish_lock: FileLock,
}

impl VersionService {
    pub fn new(config: Config, storage: StorageDriver) -> Self {
        let registry = Registry::new(&config.registry_path);
        let publish_lock = FileLock::for_document(&config.registry_path, config.lock);
        VersionService {
            config,
            storage,
            registry,
            publish_lock,
        }
    }

    /// Build the service and its storage driver from configuration
    pub async fn from_config(config: Config) -> Result<Self> {
        let storage = StorageDriver::from_config(&config).await?;
        Ok(Self::new(config, storage))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &StorageDriver {
        &self.storage
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn check_platform(&self, platform: &str) -> Result<()> {
        if platform == self.config.platform {
            Ok(())
        } else {
            Err(HotError::InvalidPlatform(platform.to_string()))
        }
    }

    fn upload_lock(&self, version: &VersionId) -> FileLock {
        let name = format!(".{version}.upload.lock");
        FileLock::new(self.config.upload_root.join(name), self.config.lock)
    }

    /// Validate, extract, mirror and record an uploaded archive.
    ///
    /// All request checks run before anything touches the disk. Uploads of
    /// the same version are serialized by a per-version lock file.
    pub async fn upload(&self, platform: &str, filename: &str, data: Bytes) -> Result<UploadOutcome> {
        self.check_platform(platform)?;
        let (version, _archive_type) = parse_upload_filename(filename)?;
        if data.is_empty() {
            return Err(HotError::InvalidRequest("uploaded archive is empty".to_string()));
        }
        let size = data.len() as u64;
        if size > self.config.max_upload_bytes {
            return Err(HotError::FileTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        let upload_root = self.config.upload_root.clone();
        tokio::fs::create_dir_all(&upload_root).await?;
        let upload_guard = self.upload_lock(&version).acquire().await?;

        info!(version = %version, platform, bytes = size, "upload received");

        let report = {
            let version = version.clone();
            let root = upload_root.clone();
            tokio::task::spawn_blocking(move || -> Result<ExtractReport> {
                let mut archive = tempfile::Builder::new()
                    .prefix(".upload-")
                    .suffix(".zip")
                    .tempfile_in(&root)?;
                archive.write_all(&data)?;
                archive.flush()?;
                extract(archive.path(), &version, &root)
            })
            .await??
        };

        let bundle_dir: PathBuf = upload_root.join(version.as_str());
        let sync = self.storage.sync(platform, &version, &bundle_dir).await?;
        debug!(version = %version, driver = self.storage.name(), skipped = sync.skipped, "bundle mirrored");

        let overwrite = {
            let guard = self.publish_lock.acquire().await?;
            let overwrite = self.registry.record_upload(&version).await?;
            guard.release()?;
            overwrite
        };
        upload_guard.release()?;

        Ok(UploadOutcome {
            platform: platform.to_string(),
            version,
            overwrite,
            extract: report,
            sync,
        })
    }

    /// Make `version` current under the publish lock.
    ///
    /// Re-publishing the current version is a no-op that writes nothing.
    pub async fn apply_version(
        &self,
        platform: &str,
        version: &VersionId,
        action: PublishAction,
    ) -> Result<ApplyOutcome> {
        let history_action = HistoryAction::from(action);
        let guard = self.publish_lock.acquire().await?;

        if !self.storage.contains(platform, version).await? {
            return Err(HotError::VersionNotFound(version.to_string()));
        }

        let doc = self.registry.read().await?;
        let already_current = doc.is_current(version);
        if already_current {
            debug!(version = %version, action = history_action.as_str(), "already current");
        } else {
            self.registry.set_current(version, history_action).await?;
        }
        guard.release()?;

        Ok(ApplyOutcome {
            platform: platform.to_string(),
            version: version.clone(),
            action: history_action,
            already_current,
        })
    }

    pub async fn publish(&self, platform: &str, version: &str) -> Result<ApplyOutcome> {
        self.check_platform(platform)?;
        let version = VersionId::parse(version)?;
        self.apply_version(platform, &version, PublishAction::Publish).await
    }

    pub async fn switch(&self, platform: &str, version: &str) -> Result<ApplyOutcome> {
        self.check_platform(platform)?;
        let version = VersionId::parse(version)?;
        self.apply_version(platform, &version, PublishAction::Switch).await
    }

    /// Record a version that reached storage without going through upload
    pub async fn register(&self, platform: &str, version: &str) -> Result<RegisterOutcome> {
        self.check_platform(platform)?;
        let version = VersionId::parse(version)?;

        let guard = self.publish_lock.acquire().await?;
        if !self.storage.contains(platform, &version).await? {
            return Err(HotError::VersionNotFound(version.to_string()));
        }
        let overwrite = self.registry.record_upload(&version).await?;
        guard.release()?;

        Ok(RegisterOutcome {
            platform: platform.to_string(),
            version,
            overwrite,
        })
    }

    /// Registry records merged with what storage actually holds
    pub async fn list(&self, platform: &str) -> Result<ListOutcome> {
        self.check_platform(platform)?;
        let discovered = self.storage.list_versions(platform).await?;
        let doc = self.registry.read().await?;

        let mut rows: BTreeMap<VersionId, VersionEntry> = BTreeMap::new();
        for record in &doc.versions {
            rows.insert(
                record.version.clone(),
                VersionEntry {
                    version: record.version.clone(),
                    uploaded_at: record.uploaded_at,
                    published_at: record.published_at,
                    current: doc.is_current(&record.version),
                    in_storage: false,
                },
            );
        }
        for version in discovered {
            rows.entry(version.clone())
                .or_insert_with(|| VersionEntry {
                    version: version.clone(),
                    uploaded_at: None,
                    published_at: None,
                    current: doc.is_current(&version),
                    in_storage: true,
                })
                .in_storage = true;
        }

        Ok(ListOutcome {
            platform: platform.to_string(),
            current_version: doc.current_version,
            versions: rows.into_values().rev().collect(),
            history: doc.history,
        })
    }

    pub async fn current(&self, platform: &str) -> Result<CurrentOutcome> {
        self.check_platform(platform)?;
        let doc = self.registry.read().await?;
        Ok(CurrentOutcome {
            platform: platform.to_string(),
            current_version: doc.current_version,
        })
    }
}
