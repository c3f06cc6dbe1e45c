use std::time::Duration;

use thiserror::Error;

/// Failures at the host-platform boundary. None of these ever reach a caller of
/// the engine; they are logged and converted to "no signal" or "try again next
/// reconcile".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("permission unavailable: {0}")]
    PermissionUnavailable(String),

    #[error("platform query failed: {0}")]
    QueryFailed(String),

    #[error("platform query timed out after {0:?}")]
    Timeout(Duration),

    #[error("overlay presentation failed: {0}")]
    PresentationFailed(String),

    #[error("display context is no longer running")]
    ChannelClosed,
}

impl PlatformError {
    pub fn kind(&self) -> &'static str {
        match self {
            PlatformError::PermissionUnavailable(_) => "permission_unavailable",
            PlatformError::QueryFailed(_) => "query_failed",
            PlatformError::Timeout(_) => "timeout",
            PlatformError::PresentationFailed(_) => "presentation_failed",
            PlatformError::ChannelClosed => "channel_closed",
        }
    }
}

/// Rejected configuration or command input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}
