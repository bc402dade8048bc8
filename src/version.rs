use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{HotError, Result};

/// A version identifier: a non-empty run of ASCII digits.
///
/// Used verbatim as a directory name and object key segment, so it can never
/// contain a path separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Parse a version identifier, rejecting anything that is not all digits
    pub fn parse(raw: &str) -> Result<Self> {
        if is_version_string(raw) {
            Ok(VersionId(raw.to_string()))
        } else {
            Err(HotError::InvalidRequest(format!(
                "version must be a non-empty string of digits, got {raw:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True for a non-empty string made only of ASCII digits
pub fn is_version_string(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionId {
    type Error = HotError;

    fn try_from(value: String) -> Result<Self> {
        if is_version_string(&value) {
            Ok(VersionId(value))
        } else {
            Err(HotError::InvalidRequest(format!(
                "version must be a non-empty string of digits, got {value:?}"
            )))
        }
    }
}

impl From<VersionId> for String {
    fn from(value: VersionId) -> Self {
        value.0
    }
}

impl Ord for VersionId {
    /// Numeric order without parsing, so arbitrarily long versions still compare
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.0.trim_start_matches('0');
        let b = other.0.trim_start_matches('0');
        a.len()
            .cmp(&b.len())
            .then_with(|| a.cmp(b))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Archive formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
}

impl ArchiveType {
    /// Detect archive type from file extension
    pub fn from_path(path: &str) -> Option<Self> {
        let path_lower = path.to_lowercase();
        if path_lower.ends_with(".zip") {
            return Some(ArchiveType::Zip);
        }
        None
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArchiveType::Zip => ".zip",
        }
    }
}

/// Split an uploaded file name into its version and archive type.
///
/// Only the final path component is considered, so `uploads/100.zip` and
/// `C:\tmp\100.zip` both yield version `100`.
pub fn parse_upload_filename(filename: &str) -> Result<(VersionId, ArchiveType)> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim();

    let archive_type = ArchiveType::from_path(base)
        .ok_or_else(|| HotError::InvalidVersionName(filename.to_string()))?;

    let stem = &base[..base.len() - archive_type.extension().len()];
    if !is_version_string(stem) {
        return Err(HotError::InvalidVersionName(filename.to_string()));
    }

    Ok((VersionId(stem.to_string()), archive_type))
}
