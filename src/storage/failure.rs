use std::fmt;
use std::io;
use thiserror::Error;

/// Provider error codes that indicate a temporary condition on the remote side
const TRANSIENT_CODES: &[&str] = &[
    "SlowDown",
    "Throttling",
    "ThrottlingException",
    "TooManyRequests",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalError",
    "RequestTimeout",
];

/// Last-resort hints for opaque providers that give neither status nor code
const TRANSIENT_MESSAGE_HINTS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "econnreset",
    "eai_again",
    "socket hang up",
    "temporarily unavailable",
    "broken pipe",
];

/// Network-level cause of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCause {
    Timeout,
    ConnectionReset,
    DnsRetry,
    Other,
}

impl fmt::Display for NetworkCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkCause::Timeout => "timeout",
            NetworkCause::ConnectionReset => "connection reset",
            NetworkCause::DnsRetry => "dns retry",
            NetworkCause::Other => "network",
        };
        f.write_str(name)
    }
}

/// Whether a failed call is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Transient,
    Permanent,
}

/// A failed object-store call with whatever structure the provider exposed.
#[derive(Debug, Clone, Error)]
#[error("{operation} failed: {message}")]
pub struct ProviderFailure {
    pub operation: String,
    pub status: Option<u16>,
    pub code: Option<String>,
    pub network: Option<NetworkCause>,
    pub message: String,
}

impl ProviderFailure {
    /// A response from the provider carrying an HTTP status and/or error code
    pub fn service(
        operation: &str,
        status: Option<u16>,
        code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        ProviderFailure {
            operation: operation.to_string(),
            status,
            code,
            network: None,
            message: message.into(),
        }
    }

    /// The request never produced a response
    pub fn network(operation: &str, cause: NetworkCause, message: impl Into<String>) -> Self {
        ProviderFailure {
            operation: operation.to_string(),
            status: None,
            code: None,
            network: Some(cause),
            message: message.into(),
        }
    }

    /// No structure at all, only a message
    pub fn opaque(operation: &str, message: impl Into<String>) -> Self {
        ProviderFailure {
            operation: operation.to_string(),
            status: None,
            code: None,
            network: None,
            message: message.into(),
        }
    }

    /// Map a local I/O error (mock mirror) onto the same structure
    pub fn from_io(operation: &str, err: &io::Error) -> Self {
        let cause = match err.kind() {
            io::ErrorKind::TimedOut => Some(NetworkCause::Timeout),
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                Some(NetworkCause::ConnectionReset)
            }
            _ => None,
        };
        match cause {
            Some(cause) => Self::network(operation, cause, err.to_string()),
            None => Self::service(operation, None, Some(format!("{:?}", err.kind())), err.to_string()),
        }
    }

    pub fn class(&self) -> RetryClass {
        classify(self)
    }
}

/// Classify a failure as transient or permanent.
///
/// Structured information (network cause, status, code) decides first; the
/// message is only inspected when the provider gave none of it.
pub fn classify(failure: &ProviderFailure) -> RetryClass {
    if failure.network.is_some() {
        return RetryClass::Transient;
    }

    if let Some(status) = failure.status {
        if status >= 500 || status == 429 {
            return RetryClass::Transient;
        }
    }

    if let Some(code) = failure.code.as_deref() {
        if TRANSIENT_CODES.contains(&code) {
            return RetryClass::Transient;
        }
    }

    if failure.status.is_some() || failure.code.is_some() {
        return RetryClass::Permanent;
    }

    let message = failure.message.to_lowercase();
    if TRANSIENT_MESSAGE_HINTS.iter().any(|hint| message.contains(hint)) {
        RetryClass::Transient
    } else {
        RetryClass::Permanent
    }
}
