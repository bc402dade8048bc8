use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use zip::ZipArchive;

use crate::error::{HotError, Result};

use super::ArchiveEntry;

/// Maximum allowed decompressed size per entry (1GB) to prevent zip bombs
const MAX_DECOMPRESSED_SIZE: u64 = 1024 * 1024 * 1024;

/// Maximum compression ratio allowed (1000:1) to detect zip bombs
const MAX_COMPRESSION_RATIO: u64 = 1000;

/// macOS Finder adds resource forks under this folder when zipping
const MACOS_ARTIFACT_DIR: &str = "__MACOSX";

/// An opened upload archive together with its normalized entry list
pub struct ZipBundle {
    archive: ZipArchive<File>,
    /// (index in the zip, normalized entry)
    entries: Vec<(usize, ArchiveEntry)>,
}

impl ZipBundle {
    /// Open a zip file and build its usable entry list.
    ///
    /// Entry names are normalized to forward slashes, `__MACOSX` artifacts
    /// are dropped, and any entry that would escape the extraction root is
    /// refused.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| {
            HotError::InvalidRequest(format!("upload is not a readable zip archive: {e}"))
        })?;

        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let file = archive.by_index(index).map_err(|e| {
                HotError::InvalidRequest(format!("archive entry {index} is unreadable: {e}"))
            })?;
            let raw_name = file.name().replace('\\', "/");
            let segments = entry_segments(&raw_name)?;

            if segments.is_empty() || segments.iter().any(|s| s == MACOS_ARTIFACT_DIR) {
                continue;
            }

            let is_dir = file.is_dir() || raw_name.ends_with('/');
            if !is_dir {
                check_zip_bomb(&raw_name, file.size(), file.compressed_size())?;
            }

            entries.push((
                index,
                ArchiveEntry {
                    path: segments.join("/"),
                    size: file.size(),
                    is_dir,
                },
            ));
        }

        Ok(ZipBundle { archive, entries })
    }

    /// Usable entries in archive order
    pub fn entries(&self) -> Vec<ArchiveEntry> {
        self.entries.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Write every usable entry under `dest`. Returns (files, bytes) written.
    pub fn extract_to(&mut self, dest: &Path) -> Result<(u64, u64)> {
        let mut files = 0;
        let mut bytes = 0;

        for (index, entry) in &self.entries {
            let target = dest.join(&entry.path);
            if entry.is_dir {
                fs::create_dir_all(&target)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let zip_file = self.archive.by_index(*index).map_err(|e| {
                HotError::InvalidRequest(format!("archive entry {} is unreadable: {e}", entry.path))
            })?;
            let mut out = File::create(&target)?;
            // Bound the copy so a lying size header cannot exhaust the disk
            let mut limited = zip_file.take(MAX_DECOMPRESSED_SIZE + 1);
            let written = io::copy(&mut limited, &mut out)?;
            if written > MAX_DECOMPRESSED_SIZE {
                return Err(HotError::InvalidRequest(format!(
                    "File too large to extract safely: {} exceeds {} byte limit",
                    entry.path, MAX_DECOMPRESSED_SIZE
                )));
            }

            files += 1;
            bytes += written;
        }

        Ok((files, bytes))
    }
}

/// Split a `/`-separated entry name into path segments.
///
/// Empty and `.` segments are dropped. Parent references, absolute paths and
/// drive-letter prefixes would escape the bundle root and are refused.
fn entry_segments(name: &str) -> Result<Vec<String>> {
    let escapes = || HotError::InvalidRequest(format!("archive entry escapes the bundle root: {name}"));

    if name.starts_with('/') {
        return Err(escapes());
    }
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(escapes());
    }

    let mut segments = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(escapes()),
            other => segments.push(other.to_string()),
        }
    }
    Ok(segments)
}

fn check_zip_bomb(name: &str, size: u64, compressed_size: u64) -> Result<()> {
    if size > MAX_DECOMPRESSED_SIZE {
        return Err(HotError::InvalidRequest(format!(
            "File too large to extract safely: {name} is {size} bytes, limit is {MAX_DECOMPRESSED_SIZE}"
        )));
    }

    if compressed_size > 0 && size / compressed_size > MAX_COMPRESSION_RATIO {
        return Err(HotError::InvalidRequest(format!(
            "Suspicious compression ratio detected for {name} ({:.0}:1). File may be a zip bomb.",
            size as f64 / compressed_size as f64
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(dir: &Path, entries: &[(&str, Option<&[u8]>)]) -> std::path::PathBuf {
        let path = dir.join("bundle.zip");
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                Some(data) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(data).unwrap();
                }
                None => writer.add_directory(*name, options).unwrap(),
            }
        }
        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_open_skips_macos_artifacts() {
        let tmp = TempDir::new().unwrap();
        let path = write_zip(
            tmp.path(),
            &[
                ("100/", None),
                ("100/config.json", Some(b"{}")),
                ("__MACOSX/100/._config.json", Some(b"junk")),
            ],
        );

        let bundle = ZipBundle::open(&path).unwrap();
        let paths: Vec<String> = bundle.entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["100", "100/config.json"]);
    }

    #[test]
    fn test_open_rejects_path_traversal() {
        let tmp = TempDir::new().unwrap();
        let path = write_zip(tmp.path(), &[("../evil.txt", Some(b"x"))]);

        let err = ZipBundle::open(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_backslash_names_become_segments() {
        let tmp = TempDir::new().unwrap();
        let path = write_zip(
            tmp.path(),
            &[("100\\config.json", Some(b"{}")), ("100\\res\\a.png", Some(b"png"))],
        );

        let mut bundle = ZipBundle::open(&path).unwrap();
        let paths: Vec<String> = bundle.entries().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec!["100/config.json", "100/res/a.png"]);

        let out = tmp.path().join("out");
        bundle.extract_to(&out).unwrap();
        assert_eq!(fs::read(out.join("100/res/a.png")).unwrap(), b"png");
    }

    #[test]
    fn test_entry_segments() {
        assert_eq!(entry_segments("a/./b//c").unwrap(), vec!["a", "b", "c"]);
        assert!(entry_segments("").unwrap().is_empty());
        assert!(entry_segments("a/../../etc").is_err());
        assert!(entry_segments("/etc/passwd").is_err());
        assert!(entry_segments("C:/Windows/x.dll").is_err());
    }

    #[test]
    fn test_corrupt_entry_is_a_bad_request() {
        let tmp = TempDir::new().unwrap();
        let path = write_zip(tmp.path(), &[("a.txt", Some(b"alpha"))]);
        let mut raw = fs::read(&path).unwrap();
        // Break the local file header signature; the central directory stays intact
        raw[..4].copy_from_slice(b"XXXX");
        fs::write(&path, &raw).unwrap();

        let err = match ZipBundle::open(&path) {
            Err(e) => e,
            Ok(mut bundle) => bundle.extract_to(&tmp.path().join("out")).unwrap_err(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_open_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("not.zip");
        fs::write(&path, b"definitely not a zip").unwrap();

        let err = ZipBundle::open(&path).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_extract_to_writes_files() {
        let tmp = TempDir::new().unwrap();
        let path = write_zip(
            tmp.path(),
            &[("a.txt", Some(b"alpha")), ("dir/b.txt", Some(b"beta"))],
        );

        let mut bundle = ZipBundle::open(&path).unwrap();
        let out = tmp.path().join("out");
        let (files, bytes) = bundle.extract_to(&out).unwrap();
        assert_eq!(files, 2);
        assert_eq!(bytes, 9);
        assert_eq!(fs::read(out.join("dir/b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn test_zip_bomb_ratio() {
        assert!(check_zip_bomb("ok", 1000, 10).is_ok());
        let err = check_zip_bomb("bomb", 10_000_000, 10).unwrap_err();
        assert!(err.to_string().contains("zip bomb"));
    }
}
