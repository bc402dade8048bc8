//! Small file-tree helpers shared by extraction, sync and discovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::version::{VersionId, is_version_string};

/// A regular file found while walking a bundle directory
#[derive(Debug, Clone)]
pub struct TreeFile {
    /// Path relative to the walk root, always joined with `/`
    pub relative: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Recursively list every regular file under `root`, sorted by relative path.
pub fn walk_files(root: &Path) -> io::Result<Vec<TreeFile>> {
    let mut files = Vec::new();
    walk_into(root, &mut Vec::new(), &mut files)?;
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn walk_into(dir: &Path, segments: &mut Vec<String>, out: &mut Vec<TreeFile>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if file_type.is_dir() {
            segments.push(name);
            walk_into(&entry.path(), segments, out)?;
            segments.pop();
        } else if file_type.is_file() {
            let relative = if segments.is_empty() {
                name
            } else {
                format!("{}/{}", segments.join("/"), name)
            };
            out.push(TreeFile {
                relative,
                path: entry.path(),
                size: entry.metadata()?.len(),
            });
        }
        // Symlinks are never produced by extraction and are not followed
    }
    Ok(())
}

/// Copy the tree at `src` into `dst`, creating directories as needed.
/// Returns (files copied, bytes copied).
pub fn copy_tree(src: &Path, dst: &Path) -> io::Result<(u64, u64)> {
    fs::create_dir_all(dst)?;
    let mut files = 0;
    let mut bytes = 0;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());

        if file_type.is_dir() {
            let (f, b) = copy_tree(&entry.path(), &target)?;
            files += f;
            bytes += b;
        } else if file_type.is_file() {
            bytes += fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }

    Ok((files, bytes))
}

/// Names of the version directories directly under `root`.
///
/// A missing root yields an empty list; hidden staging and lock entries are
/// skipped because their names are not all digits.
pub fn list_version_dirs(root: &Path) -> io::Result<Vec<VersionId>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_version_string(&name) {
            if let Ok(version) = VersionId::parse(&name) {
                versions.push(version);
            }
        }
    }
    versions.sort();
    Ok(versions)
}

/// Remove empty directories from `start` upwards, stopping at `root`.
pub fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = start.to_path_buf();
    while current.starts_with(root) && current != root {
        if fs::remove_dir(&current).is_err() {
            break;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }
}
