//! Error taxonomy for version management.
//!
//! Every failure carries a stable [`ErrorKind`] so a boundary layer can map it
//! to a response code without looking at the message text.

use serde::Serialize;
use thiserror::Error;

use crate::storage::ProviderFailure;

/// Machine-readable classification of a [`HotError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPlatform,
    InvalidVersionName,
    InvalidRequest,
    ZipStructureMismatch,
    VersionNotFound,
    LockBusy,
    FileTooLarge,
    StorageConfigMissing,
    Internal,
}

impl ErrorKind {
    /// Stable numeric code used in the response envelope
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::InvalidPlatform => 1001,
            ErrorKind::InvalidVersionName => 1002,
            ErrorKind::InvalidRequest => 1003,
            ErrorKind::ZipStructureMismatch => 1004,
            ErrorKind::VersionNotFound => 1005,
            ErrorKind::LockBusy => 1006,
            ErrorKind::FileTooLarge => 1007,
            ErrorKind::StorageConfigMissing => 1008,
            ErrorKind::Internal => 1500,
        }
    }

    /// Suggested HTTP status for transports that need one
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidPlatform
            | ErrorKind::InvalidVersionName
            | ErrorKind::InvalidRequest => 400,
            ErrorKind::ZipStructureMismatch => 422,
            ErrorKind::VersionNotFound => 404,
            ErrorKind::LockBusy => 409,
            ErrorKind::FileTooLarge => 413,
            ErrorKind::StorageConfigMissing | ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum HotError {
    #[error("unsupported platform: {0}")]
    InvalidPlatform(String),

    #[error("invalid version file name: {0} (expected <digits>.zip)")]
    InvalidVersionName(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("zip layout does not match version {version}: {reason}")]
    ZipStructureMismatch { version: String, reason: String },

    #[error("version not found in storage: {0}")]
    VersionNotFound(String),

    #[error("lock busy: {0} is held by another operation")]
    LockBusy(String),

    #[error("archive too large: {size} bytes exceeds {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("remote storage is not configured: missing {0}")]
    StorageConfigMissing(String),

    #[error("storage provider error: {0}")]
    Provider(#[from] ProviderFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HotError::InvalidPlatform(_) => ErrorKind::InvalidPlatform,
            HotError::InvalidVersionName(_) => ErrorKind::InvalidVersionName,
            HotError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            HotError::ZipStructureMismatch { .. } => ErrorKind::ZipStructureMismatch,
            HotError::VersionNotFound(_) => ErrorKind::VersionNotFound,
            HotError::LockBusy(_) => ErrorKind::LockBusy,
            HotError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            HotError::StorageConfigMissing(_) => ErrorKind::StorageConfigMissing,
            HotError::Provider(_)
            | HotError::Io(_)
            | HotError::Serialization(_)
            | HotError::Zip(_)
            | HotError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for HotError {
    fn from(err: tokio::task::JoinError) -> Self {
        HotError::Internal(format!("background task failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, HotError>;

/// Response envelope handed to the transport layer: `{code, msg, data}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u32,
    pub msg: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn from_error(err: &HotError) -> Self {
        ApiResponse {
            code: err.kind().code(),
            msg: err.to_string(),
            data: None,
        }
    }

    pub fn from_result(result: &Result<T>) -> Self
    where
        T: Clone,
    {
        match result {
            Ok(data) => Self::ok(data.clone()),
            Err(e) => Self::from_error(e),
        }
    }
}
