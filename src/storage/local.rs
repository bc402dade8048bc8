use std::path::PathBuf;

use crate::error::Result;
use crate::fs_tree;
use crate::version::VersionId;

/// The local upload root is itself the authoritative store
#[derive(Debug, Clone)]
pub struct LocalDriver {
    upload_root: PathBuf,
    legacy_root: Option<PathBuf>,
}

impl LocalDriver {
    pub fn new(upload_root: impl Into<PathBuf>, legacy_root: Option<PathBuf>) -> Self {
        LocalDriver {
            upload_root: upload_root.into(),
            legacy_root,
        }
    }

    /// Versions present under the upload root or the legacy publish root
    pub async fn list_versions(&self) -> Result<Vec<VersionId>> {
        let roots: Vec<PathBuf> = std::iter::once(self.upload_root.clone())
            .chain(self.legacy_root.clone())
            .collect();

        let versions = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<VersionId>> {
            let mut all = Vec::new();
            for root in &roots {
                all.extend(fs_tree::list_version_dirs(root)?);
            }
            all.sort();
            all.dedup();
            Ok(all)
        })
        .await??;

        Ok(versions)
    }
}
