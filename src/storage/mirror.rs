//! Local directory standing in for a bucket in mock mode.

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs_tree;

use super::failure::ProviderFailure;
use super::object_store::ObjectStore;

/// Object store backed by a plain directory: key `a/b/c` lives at `{root}/a/b/c`
pub struct MirrorStore {
    root: PathBuf,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MirrorStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl ObjectStore for MirrorStore {
    fn name(&self) -> &str {
        "mirror"
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ProviderFailure> {
        let dir = self.path_for(prefix);
        let prefix = prefix.to_string();
        tokio::task::spawn_blocking(move || -> io::Result<Vec<String>> {
            if !dir.is_dir() {
                return Ok(Vec::new());
            }
            let files = fs_tree::walk_files(&dir)?;
            Ok(files
                .into_iter()
                .map(|f| format!("{prefix}{}", f.relative))
                .collect())
        })
        .await
        .map_err(|e| ProviderFailure::opaque("list_keys", e.to_string()))?
        .map_err(|e| ProviderFailure::from_io("list_keys", &e))
    }

    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ProviderFailure> {
        let dir = self.path_for(prefix);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProviderFailure::from_io("list_child_prefixes", &e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ProviderFailure::from_io("list_child_prefixes", &e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| ProviderFailure::from_io("list_child_prefixes", &e))?
                .is_dir();
            if is_dir {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), ProviderFailure> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProviderFailure::from_io("put_object", &e))?;
        }
        tokio::fs::write(&path, &body)
            .await
            .map_err(|e| ProviderFailure::from_io("put_object", &e))
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), ProviderFailure> {
        for key in keys {
            let path = self.path_for(key);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(ProviderFailure::from_io("delete_objects", &e)),
            }
            // Buckets have no empty directories
            if let Some(parent) = path.parent() {
                fs_tree::prune_empty_dirs(parent, &self.root);
            }
        }
        Ok(())
    }
}
