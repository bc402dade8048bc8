use async_trait::async_trait;
use bytes::Bytes;

use super::failure::ProviderFailure;

/// Minimal bucket operations needed to mirror bundles.
///
/// Prefixes passed in always end with `/` (or are empty for the bucket root).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Every object key under `prefix`
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, ProviderFailure>;

    /// Names of the immediate "subdirectories" under `prefix`
    async fn list_child_prefixes(&self, prefix: &str) -> Result<Vec<String>, ProviderFailure>;

    /// Store `body` under `key`, replacing any existing object
    async fn put_object(&self, key: &str, body: Bytes) -> Result<(), ProviderFailure>;

    /// Delete up to [`MAX_DELETE_BATCH`] keys in one call
    async fn delete_objects(&self, keys: &[String]) -> Result<(), ProviderFailure>;
}

/// Maximum number of keys a single delete request may carry
pub const MAX_DELETE_BATCH: usize = 1000;
