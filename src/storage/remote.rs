use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{HotError, Result};
use crate::fs_tree::{self, TreeFile};
use crate::version::{VersionId, is_version_string};

use super::SyncReport;
use super::object_store::{MAX_DELETE_BATCH, ObjectStore};
use super::retry::RetryPolicy;

/// Files uploaded at the same time during a sync
const UPLOAD_CONCURRENCY: usize = 8;

/// Where bundles live inside the bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    /// Primary layout root: `{prefix}/{platform}/{version}/`
    pub prefix: String,
    /// Legacy layout root: `{legacy_prefix}/{version}/`; `None` disables it
    pub legacy_prefix: Option<String>,
}

impl RemoteLayout {
    /// Directory-style prefix for the primary listing of a platform
    pub fn platform_prefix(&self, platform: &str) -> String {
        join_prefix(&[&self.prefix, platform])
    }

    pub fn primary(&self, platform: &str, version: &VersionId) -> String {
        join_prefix(&[&self.prefix, platform, version.as_str()])
    }

    pub fn legacy(&self, version: &VersionId) -> Option<String> {
        self.legacy_prefix
            .as_deref()
            .map(|root| join_prefix(&[root, version.as_str()]))
    }

    /// Every prefix a version's bundle is mirrored to
    pub fn destinations(&self, platform: &str, version: &VersionId) -> Vec<String> {
        std::iter::once(self.primary(platform, version))
            .chain(self.legacy(version))
            .collect()
    }
}

/// Join non-empty segments with `/` and end with `/`; the empty join is the bucket root.
fn join_prefix(segments: &[&str]) -> String {
    let parts: Vec<&str> = segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    }
}

/// Mirrors bundles into an object store and discovers versions there
pub struct RemoteDriver {
    store: Arc<dyn ObjectStore>,
    layout: RemoteLayout,
    retry: RetryPolicy,
}

impl RemoteDriver {
    pub fn new(store: Arc<dyn ObjectStore>, layout: RemoteLayout, retry: RetryPolicy) -> Self {
        RemoteDriver {
            store,
            layout,
            retry,
        }
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Replace the remote copy of `version` with the tree at `source_dir`.
    pub async fn sync(&self, platform: &str, version: &VersionId, source_dir: &Path) -> Result<SyncReport> {
        let root = source_dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || fs_tree::walk_files(&root)).await??;

        let mut report = SyncReport::default();
        for prefix in self.layout.destinations(platform, version) {
            self.clear_prefix(&prefix, &mut report).await?;
            self.upload_tree(&prefix, &files, &mut report).await?;
            debug!(store = self.store.name(), prefix = %prefix, files = files.len(), "prefix mirrored");
        }

        info!(
            store = self.store.name(),
            version = %version,
            deleted = report.objects_deleted,
            uploaded = report.objects_uploaded,
            bytes = report.bytes_uploaded,
            retries = report.retries,
            "bundle synced"
        );
        Ok(report)
    }

    /// Delete every object under `prefix` so no stale file survives a re-upload
    async fn clear_prefix(&self, prefix: &str, report: &mut SyncReport) -> Result<()> {
        let store = &self.store;
        let (keys, attempts) = self
            .retry
            .run("list_keys", || store.list_keys(prefix))
            .await?;
        report.retries += attempts - 1;

        for batch in keys.chunks(MAX_DELETE_BATCH) {
            let ((), attempts) = self
                .retry
                .run("delete_objects", || store.delete_objects(batch))
                .await?;
            report.retries += attempts - 1;
            report.objects_deleted += batch.len() as u64;
        }
        Ok(())
    }

    async fn upload_tree(&self, prefix: &str, files: &[TreeFile], report: &mut SyncReport) -> Result<()> {
        let results: Vec<(u64, u32)> = stream::iter(files)
            .map(|file| self.upload_file(prefix, file))
            .buffer_unordered(UPLOAD_CONCURRENCY)
            .try_collect()
            .await?;

        for (bytes, attempts) in results {
            report.objects_uploaded += 1;
            report.bytes_uploaded += bytes;
            report.retries += attempts - 1;
        }
        Ok(())
    }

    async fn upload_file(&self, prefix: &str, file: &TreeFile) -> Result<(u64, u32)> {
        let key = format!("{prefix}{}", file.relative);
        let body = Bytes::from(tokio::fs::read(&file.path).await?);
        let size = body.len() as u64;

        let store = &self.store;
        let ((), attempts) = self
            .retry
            .run("put_object", || store.put_object(&key, body.clone()))
            .await
            .map_err(HotError::from)?;
        Ok((size, attempts))
    }

    /// Versions present under the primary or legacy layout
    pub async fn list_versions(&self, platform: &str) -> Result<Vec<VersionId>> {
        let mut prefixes = vec![self.layout.platform_prefix(platform)];
        if let Some(legacy) = &self.layout.legacy_prefix {
            prefixes.push(join_prefix(&[legacy]));
        }

        let store = &self.store;
        let mut versions = Vec::new();
        for prefix in prefixes {
            let (names, _) = self
                .retry
                .run("list_prefixes", || store.list_child_prefixes(&prefix))
                .await?;
            versions.extend(
                names
                    .iter()
                    .filter(|n| is_version_string(n))
                    .filter_map(|n| VersionId::parse(n).ok()),
            );
        }

        versions.sort();
        versions.dedup();
        Ok(versions)
    }
}
