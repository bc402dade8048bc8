//! The version registry: one JSON document holding the current pointer, the
//! known versions and an append-only history.
//!
//! Writes go to a temp file in the same directory and are renamed over the
//! live document, so readers never observe a half-written file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{HotError, Result};
use crate::version::VersionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Upload,
    UploadOverwrite,
    Publish,
    Switch,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Upload => "upload",
            HistoryAction::UploadOverwrite => "upload_overwrite",
            HistoryAction::Publish => "publish",
            HistoryAction::Switch => "switch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: VersionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub version: VersionId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    /// Empty until the first publish or switch
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl RegistryDocument {
    pub fn current(&self) -> Option<VersionId> {
        VersionId::parse(&self.current_version).ok()
    }

    pub fn is_current(&self, version: &VersionId) -> bool {
        self.current_version == version.as_str()
    }

    pub fn record(&self, version: &VersionId) -> Option<&VersionRecord> {
        self.versions.iter().find(|r| &r.version == version)
    }

    fn record_mut(&mut self, version: &VersionId) -> &mut VersionRecord {
        if let Some(index) = self.versions.iter().position(|r| &r.version == version) {
            return &mut self.versions[index];
        }
        self.versions.push(VersionRecord {
            version: version.clone(),
            uploaded_at: None,
            published_at: None,
        });
        let last = self.versions.len() - 1;
        &mut self.versions[last]
    }

    /// Upsert `uploadedAt`; returns true when the version was already known
    pub fn record_upload(&mut self, version: &VersionId, at: DateTime<Utc>) -> bool {
        let overwrite = self.record(version).is_some();
        self.record_mut(version).uploaded_at = Some(at);
        let action = if overwrite {
            HistoryAction::UploadOverwrite
        } else {
            HistoryAction::Upload
        };
        self.history.push(HistoryEntry {
            action,
            version: version.clone(),
            at,
        });
        overwrite
    }

    /// Point `currentVersion` at `version` and stamp `publishedAt`
    pub fn set_current(&mut self, version: &VersionId, action: HistoryAction, at: DateTime<Utc>) {
        self.record_mut(version).published_at = Some(at);
        self.current_version = version.to_string();
        self.history.push(HistoryEntry {
            action,
            version: version.clone(),
            at,
        });
    }
}

/// File-backed registry document
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Registry { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document; missing or unparsable files read as the default
    pub async fn read(&self) -> Result<RegistryDocument> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "registry missing, using empty document");
                return Ok(RegistryDocument::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "registry unreadable, using empty document");
                Ok(RegistryDocument::default())
            }
        }
    }

    /// Atomically replace the document on disk
    pub async fn write(&self, doc: &RegistryDocument) -> Result<()> {
        let json = serde_json::to_vec_pretty(doc)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &json)).await??;
        Ok(())
    }

    /// Record a successful upload; returns the overwrite flag.
    ///
    /// Callers serialize registry mutations with the publish lock.
    pub async fn record_upload(&self, version: &VersionId) -> Result<bool> {
        let mut doc = self.read().await?;
        let overwrite = doc.record_upload(version, Utc::now());
        self.write(&doc).await?;
        info!(version = %version, overwrite, "upload recorded");
        Ok(overwrite)
    }

    /// Make `version` current and append `action` to the history
    pub async fn set_current(&self, version: &VersionId, action: HistoryAction) -> Result<()> {
        let mut doc = self.read().await?;
        doc.set_current(version, action, Utc::now());
        self.write(&doc).await?;
        info!(version = %version, action = action.as_str(), "current version updated");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".registry-")
        .suffix(".tmp")
        .tempfile_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| HotError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn v(raw: &str) -> VersionId {
        VersionId::parse(raw).unwrap()
    }

    #[test]
    fn test_record_upload_overwrite_flag() {
        let mut doc = RegistryDocument::default();
        let now = Utc::now();

        assert!(!doc.record_upload(&v("100"), now));
        assert!(doc.record_upload(&v("100"), now));
        assert_eq!(doc.versions.len(), 1);

        let actions: Vec<_> = doc.history.iter().map(|h| h.action).collect();
        assert_eq!(actions, vec![HistoryAction::Upload, HistoryAction::UploadOverwrite]);
    }

    #[test]
    fn test_set_current_upserts_record() {
        let mut doc = RegistryDocument::default();
        doc.set_current(&v("7"), HistoryAction::Switch, Utc::now());

        assert_eq!(doc.current_version, "7");
        let record = doc.record(&v("7")).unwrap();
        assert!(record.published_at.is_some());
        assert!(record.uploaded_at.is_none());
        assert_eq!(doc.history.len(), 1);
    }

    #[test]
    fn test_document_json_shape() {
        let mut doc = RegistryDocument::default();
        doc.record_upload(&v("100"), Utc::now());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["currentVersion"], "");
        assert_eq!(json["versions"][0]["version"], "100");
        assert!(json["versions"][0]["uploadedAt"].is_string());
        assert!(json["versions"][0].get("publishedAt").is_none());
        assert_eq!(json["history"][0]["action"], "upload");
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::new(tmp.path().join("state/versions.json"));

        let mut doc = RegistryDocument::default();
        doc.record_upload(&v("100"), Utc::now());
        doc.set_current(&v("100"), HistoryAction::Publish, Utc::now());
        registry.write(&doc).await.unwrap();

        let back = registry.read().await.unwrap();
        assert_eq!(back, doc);

        let left_over: Vec<_> = std::fs::read_dir(tmp.path().join("state"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(left_over.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_reads_as_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(&path, b"{\"currentVersion\": \"1").unwrap();

        let registry = Registry::new(&path);
        assert_eq!(registry.read().await.unwrap(), RegistryDocument::default());

        // A write after corruption persists a well-formed document again
        registry.record_upload(&v("3")).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: RegistryDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.versions.len(), 1);
    }

    #[tokio::test]
    async fn test_crash_leftover_temp_file_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("versions.json");
        std::fs::write(tmp.path().join(".registry-abc.tmp"), b"{\"currentVersion\":").unwrap();

        let doc = Registry::new(&path).read().await.unwrap();
        assert_eq!(doc, RegistryDocument::default());
    }
}
