//! Runtime configuration, read from `HOTVER_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HotError, Result};
use crate::lock::LockOptions;
use crate::storage::RetryPolicy;

/// The one platform this deployment serves
pub const DEFAULT_PLATFORM: &str = "wxmini";

const DEFAULT_MAX_UPLOAD_MB: u64 = 200;

/// Which backing store discovery and sync run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Local,
    Remote,
}

impl DriverKind {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" | "" => Ok(DriverKind::Local),
            "remote" | "s3" | "cos" | "oss" => Ok(DriverKind::Remote),
            other => Err(HotError::InvalidRequest(format!(
                "unknown storage driver {other:?} (expected local or remote)"
            ))),
        }
    }
}

/// Object storage settings for the remote driver
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Optional custom endpoint URL for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Whether to use path-style addressing (required for some S3-compatible services)
    pub force_path_style: bool,
    /// Root of the primary `{prefix}/{platform}/{version}/` layout
    pub prefix: String,
    /// Root of the legacy `{legacy_prefix}/{version}/` layout
    pub legacy_prefix: String,
    /// Also mirror every bundle under the legacy layout
    pub mirror_legacy: bool,
    /// Replace the bucket with this local directory (tests, offline setups)
    pub mock_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl RemoteConfig {
    /// Names of the settings the real S3 client still needs
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let fields = [
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("access key id", &self.access_key_id),
            ("secret access key", &self.secret_access_key),
        ];
        for (name, value) in fields {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                missing.push(name);
            }
        }
        missing
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub platform: String,
    /// Extracted bundles live at `{upload_root}/{version}`
    pub upload_root: PathBuf,
    /// Older deployments published bundles here; still counted by discovery
    pub legacy_publish_root: Option<PathBuf>,
    pub registry_path: PathBuf,
    pub max_upload_bytes: u64,
    pub lock: LockOptions,
    pub driver: DriverKind,
    pub remote: RemoteConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = var("HOTVER_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::data_local_dir().map(|d| d.join("hotver")))
            .unwrap_or_else(|| PathBuf::from("data"));

        let mut config = Config::for_root(&data_dir);

        if let Some(platform) = var("HOTVER_PLATFORM") {
            config.platform = platform;
        }
        if let Some(root) = var("HOTVER_UPLOAD_ROOT") {
            config.upload_root = PathBuf::from(root);
        }
        if let Some(path) = var("HOTVER_REGISTRY_PATH") {
            config.registry_path = PathBuf::from(path);
        }
        config.legacy_publish_root = var("HOTVER_LEGACY_PUBLISH_ROOT").map(PathBuf::from);

        if let Some(mb) = parse_number(&var, "HOTVER_MAX_UPLOAD_MB")? {
            config.max_upload_bytes = mb.checked_mul(1024 * 1024).ok_or_else(|| {
                HotError::InvalidRequest(format!("HOTVER_MAX_UPLOAD_MB is too large: {mb}"))
            })?;
        }
        if let Some(retries) = parse_u32(&var, "HOTVER_LOCK_RETRIES")? {
            config.lock.retries = retries;
        }
        if let Some(ms) = parse_number(&var, "HOTVER_LOCK_DELAY_MS")? {
            config.lock.delay = Duration::from_millis(ms);
        }

        if let Some(driver) = var("HOTVER_STORAGE_DRIVER") {
            config.driver = DriverKind::parse(&driver)?;
        }

        let remote = &mut config.remote;
        remote.bucket = var("HOTVER_REMOTE_BUCKET");
        remote.region = var("HOTVER_REMOTE_REGION");
        remote.access_key_id = var("HOTVER_REMOTE_ACCESS_KEY_ID");
        remote.secret_access_key = var("HOTVER_REMOTE_SECRET_ACCESS_KEY");
        remote.endpoint_url = var("HOTVER_REMOTE_ENDPOINT");
        remote.force_path_style = parse_bool(&var, "HOTVER_REMOTE_FORCE_PATH_STYLE")?.unwrap_or(false);
        if let Some(prefix) = lookup("HOTVER_REMOTE_PREFIX") {
            remote.prefix = prefix;
        }
        if let Some(prefix) = lookup("HOTVER_REMOTE_LEGACY_PREFIX") {
            remote.legacy_prefix = prefix;
        }
        if let Some(mirror) = parse_bool(&var, "HOTVER_REMOTE_MIRROR_LEGACY")? {
            remote.mirror_legacy = mirror;
        }
        remote.mock_dir = var("HOTVER_REMOTE_MOCK_DIR").map(PathBuf::from);
        if let Some(attempts) = parse_u32(&var, "HOTVER_REMOTE_RETRIES")? {
            remote.retry.attempts = attempts.max(1);
        }
        if let Some(ms) = parse_number(&var, "HOTVER_REMOTE_BACKOFF_MS")? {
            remote.retry.base_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Self-contained configuration with everything under `root`
    pub fn for_root(root: &Path) -> Self {
        Config {
            platform: DEFAULT_PLATFORM.to_string(),
            upload_root: root.join("uploads"),
            legacy_publish_root: None,
            registry_path: root.join("versions.json"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            lock: LockOptions::default(),
            driver: DriverKind::Local,
            remote: RemoteConfig {
                prefix: "hotupdate".to_string(),
                legacy_prefix: "publish".to_string(),
                mirror_legacy: true,
                ..RemoteConfig::default()
            },
        }
    }
}

fn parse_number<F>(var: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                HotError::InvalidRequest(format!("{key} must be a non-negative integer, got {raw:?}"))
            })
        })
        .transpose()
}

fn parse_u32<F>(var: &F, key: &str) -> Result<Option<u32>>
where
    F: Fn(&str) -> Option<String>,
{
    parse_number(var, key)?
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| HotError::InvalidRequest(format!("{key} is out of range, got {n}")))
        })
        .transpose()
}

fn parse_bool<F>(var: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(HotError::InvalidRequest(format!("{key} must be a boolean, got {raw:?}"))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_under_data_dir() {
        let config = config_from(&[("HOTVER_DATA_DIR", "/srv/hot")]).unwrap();
        assert_eq!(config.platform, "wxmini");
        assert_eq!(config.upload_root, PathBuf::from("/srv/hot/uploads"));
        assert_eq!(config.registry_path, PathBuf::from("/srv/hot/versions.json"));
        assert_eq!(config.driver, DriverKind::Local);
        assert_eq!(config.max_upload_bytes, 200 * 1024 * 1024);
        assert!(config.remote.mirror_legacy);
    }

    #[test]
    fn test_remote_settings() {
        let config = config_from(&[
            ("HOTVER_DATA_DIR", "/srv/hot"),
            ("HOTVER_STORAGE_DRIVER", "remote"),
            ("HOTVER_REMOTE_BUCKET", "games"),
            ("HOTVER_REMOTE_REGION", "ap-shanghai"),
            ("HOTVER_REMOTE_FORCE_PATH_STYLE", "true"),
            ("HOTVER_REMOTE_LEGACY_PREFIX", ""),
            ("HOTVER_REMOTE_RETRIES", "5"),
            ("HOTVER_REMOTE_BACKOFF_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.driver, DriverKind::Remote);
        assert!(config.remote.force_path_style);
        assert_eq!(config.remote.legacy_prefix, "");
        assert_eq!(config.remote.retry.attempts, 5);
        assert_eq!(config.remote.retry.base_delay, Duration::from_millis(250));
        assert_eq!(
            config.remote.missing_fields(),
            vec!["access key id", "secret access key"]
        );
    }

    #[test]
    fn test_malformed_numbers_rejected() {
        let err = config_from(&[("HOTVER_LOCK_RETRIES", "lots")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = config_from(&[("HOTVER_STORAGE_DRIVER", "ftp")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_out_of_range_numbers_rejected() {
        let err = config_from(&[("HOTVER_MAX_UPLOAD_MB", "18446744073709")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = config_from(&[("HOTVER_LOCK_RETRIES", "4294967296")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let err = config_from(&[("HOTVER_REMOTE_RETRIES", "4294967296")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let config = config_from(&[
            ("HOTVER_MAX_UPLOAD_MB", "17592186044415"),
            ("HOTVER_LOCK_RETRIES", "4294967295"),
        ])
        .unwrap();
        assert_eq!(config.max_upload_bytes, 17_592_186_044_415 * 1024 * 1024);
        assert_eq!(config.lock.retries, u32::MAX);
    }
}
