//! Layout checks for uploaded bundles.
//!
//! Operators commonly build archives with `zip -r 100.zip 100`, which nests the
//! bundle one level deep. The inspector detects that single wrapping folder
//! and asks the extractor to strip it, without assuming every archive is
//! built that way.

use std::collections::BTreeSet;

use crate::version::VersionId;

use super::ArchiveEntry;

/// Result of inspecting an archive's entry list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutVerdict {
    /// The layout is acceptable
    pub ok: bool,
    /// The single top-level folder must be removed during extraction
    pub flatten: bool,
}

impl LayoutVerdict {
    const REJECT: Self = LayoutVerdict {
        ok: false,
        flatten: false,
    };
    const PASS_THROUGH: Self = LayoutVerdict {
        ok: true,
        flatten: false,
    };
    const FLATTEN: Self = LayoutVerdict {
        ok: true,
        flatten: true,
    };
}

/// Decide whether `entries` form an acceptable bundle for `version`.
pub fn inspect(entries: &[ArchiveEntry], version: &VersionId) -> LayoutVerdict {
    if entries.is_empty() {
        return LayoutVerdict::REJECT;
    }

    let tops = top_level_names(entries);
    let has_root_file = entries.iter().any(ArchiveEntry::is_root_file);

    if has_root_file {
        // Mixed layouts are passed through untouched
        return LayoutVerdict::PASS_THROUGH;
    }

    if tops.len() == 1 {
        return match tops.first() {
            Some(name) if *name == version.as_str() => LayoutVerdict::FLATTEN,
            _ => LayoutVerdict::REJECT,
        };
    }

    LayoutVerdict::PASS_THROUGH
}

/// Human-readable reason for a rejected verdict
pub fn rejection_reason(entries: &[ArchiveEntry], version: &VersionId) -> String {
    if entries.is_empty() {
        return "archive has no usable entries".to_string();
    }
    match top_level_names(entries).first() {
        Some(name) => format!(
            "only top-level folder is {name:?}; expected {:?} or the bundle files at the archive root",
            version.as_str()
        ),
        None => "archive layout is not recognized".to_string(),
    }
}

fn top_level_names(entries: &[ArchiveEntry]) -> BTreeSet<&str> {
    entries.iter().map(ArchiveEntry::top_level).collect()
}
