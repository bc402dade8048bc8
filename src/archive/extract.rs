use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{HotError, Result};
use crate::fs_tree;
use crate::version::VersionId;

use super::inspect::{inspect, rejection_reason};
use super::reader::ZipBundle;

/// Summary of a completed extraction
#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub version: VersionId,
    pub flattened: bool,
    pub files: u64,
    pub bytes: u64,
}

/// Extract `archive_path` into `{upload_root}/{version}`.
///
/// The archive is unpacked into a staging directory inside `upload_root`
/// first; the live bundle directory is only touched once extraction has
/// succeeded. The staging directory is removed on every path.
pub fn extract(archive_path: &Path, version: &VersionId, upload_root: &Path) -> Result<ExtractReport> {
    fs::create_dir_all(upload_root)?;

    let mut bundle = ZipBundle::open(archive_path)?;
    let entries = bundle.entries();
    let verdict = inspect(&entries, version);
    if !verdict.ok {
        return Err(HotError::ZipStructureMismatch {
            version: version.to_string(),
            reason: rejection_reason(&entries, version),
        });
    }

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(upload_root)?;
    bundle.extract_to(staging.path())?;
    debug!(version = %version, staging = %staging.path().display(), "archive unpacked to staging");

    let source = if verdict.flatten {
        staging.path().join(version.as_str())
    } else {
        staging.path().to_path_buf()
    };

    let dest = upload_root.join(version.as_str());
    if dest.exists() {
        fs::remove_dir_all(&dest)?;
    }
    fs::create_dir_all(&dest)?;
    let (files, bytes) = fs_tree::copy_tree(&source, &dest)?;

    staging.close()?;

    info!(
        version = %version,
        flattened = verdict.flatten,
        files,
        bytes,
        dest = %dest.display(),
        "bundle extracted"
    );

    Ok(ExtractReport {
        version: version.clone(),
        flattened: verdict.flatten,
        files,
        bytes,
    })
}
