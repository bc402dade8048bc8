//! Cooperative cross-process lock built on an exclusively created sentinel file.
//!
//! Works across process instances that share the filesystem (for example
//! during a rolling redeploy) without a separate coordination service.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{HotError, Result};

/// Suffix appended to the registry path to form the publish lock path
pub const PUBLISH_LOCK_SUFFIX: &str = ".publish.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Extra attempts after the first failed one
    pub retries: u32,
    /// Fixed wait between attempts
    pub delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions {
            retries: 50,
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    options: LockOptions,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>, options: LockOptions) -> Self {
        FileLock {
            path: path.into(),
            options,
        }
    }

    /// The lock guarding publish/switch for the document at `document_path`
    pub fn for_document(document_path: &Path, options: LockOptions) -> Self {
        let mut raw = document_path.as_os_str().to_owned();
        raw.push(PUBLISH_LOCK_SUFFIX);
        FileLock::new(PathBuf::from(raw), options)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Poll until the sentinel file can be created, or fail with `LockBusy`.
    pub async fn acquire(&self) -> Result<LockGuard> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempt = 0;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)
                .await
            {
                Ok(mut file) => {
                    let owner = format!(
                        "pid={}\nacquired_at={}\n",
                        std::process::id(),
                        chrono::Utc::now().to_rfc3339()
                    );
                    // Owner info is diagnostic only
                    let _ = file.write_all(owner.as_bytes()).await;
                    debug!(lock = %self.path.display(), attempt, "lock acquired");
                    return Ok(LockGuard {
                        path: self.path.clone(),
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if attempt >= self.options.retries {
                        warn!(lock = %self.path.display(), attempts = attempt + 1, "lock still held, giving up");
                        return Err(HotError::LockBusy(self.path.display().to_string()));
                    }
                    attempt += 1;
                    tokio::time::sleep(self.options.delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Holds the lock until dropped or explicitly released
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now and report any error removing the sentinel file
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        remove_sentinel(&self.path).map_err(HotError::from)
    }
}

// Error and early-return paths only; success paths call `release`.
// A single synchronous unlink, even inside the async runtime.
impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_sentinel(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

fn remove_sentinel(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn fast() -> LockOptions {
        LockOptions {
            retries: 3,
            delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_lock_path_for_document() {
        let lock = FileLock::for_document(Path::new("/data/versions.json"), fast());
        assert_eq!(lock.path(), Path::new("/data/versions.json.publish.lock"));
    }

    #[tokio::test]
    async fn test_second_acquire_is_busy() {
        let tmp = TempDir::new().unwrap();
        let lock = FileLock::new(tmp.path().join("x.lock"), fast());

        let guard = lock.acquire().await.unwrap();
        let err = lock.acquire().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockBusy);

        drop(guard);
        assert!(!tmp.path().join("x.lock").exists());
        let again = lock.acquire().await.unwrap();
        again.release().unwrap();
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let tmp = TempDir::new().unwrap();
        let lock = FileLock::new(
            tmp.path().join("y.lock"),
            LockOptions {
                retries: 100,
                delay: Duration::from_millis(5),
            },
        );

        let guard = lock.acquire().await.unwrap();
        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire().await.map(|g| g.release()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        waiter.await.unwrap().unwrap().unwrap();
    }
}
