use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use provider_google_drive::GoogleDriveError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Drive request failed: {0}")]
    Drive(#[from] GoogleDriveError),

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("{}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a file path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

/// Coarse classification of a [`CoreError`] for callers that branch on the
/// kind of failure rather than its source crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    QuotaExceeded,
    RateLimited,
    /// The remote rejected the access token
    Unauthorized,
    /// No response was received
    Network,
    /// Credentials could not be obtained
    Authorization,
    LocalIo,
    InvalidResponse,
    Configuration,
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Auth(error) => match error {
                AuthError::NetworkError(_) => ErrorKind::Network,
                AuthError::Io(_) => ErrorKind::LocalIo,
                AuthError::MissingClientSecrets | AuthError::InvalidClientSecrets { .. } => {
                    ErrorKind::Configuration
                }
                _ => ErrorKind::Authorization,
            },
            CoreError::Drive(error) => match error {
                GoogleDriveError::Unauthorized(_) => ErrorKind::Unauthorized,
                GoogleDriveError::PermissionDenied(_) => ErrorKind::PermissionDenied,
                GoogleDriveError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
                GoogleDriveError::RateLimited(_) => ErrorKind::RateLimited,
                GoogleDriveError::FileNotFound { .. } => ErrorKind::NotFound,
                GoogleDriveError::NetworkError(_) => ErrorKind::Network,
                GoogleDriveError::ApiError { .. } | GoogleDriveError::ParseError(_) => {
                    ErrorKind::InvalidResponse
                }
                GoogleDriveError::BridgeError(bridge) => bridge_kind(bridge),
            },
            CoreError::Runtime(_) => ErrorKind::Configuration,
            CoreError::Io { .. } | CoreError::InvalidPath(_) => ErrorKind::LocalIo,
            CoreError::Bridge(bridge) => bridge_kind(bridge),
        }
    }
}

fn bridge_kind(error: &BridgeError) -> ErrorKind {
    match error {
        BridgeError::Timeout(_) | BridgeError::Connection(_) => ErrorKind::Network,
        BridgeError::Io(_) => ErrorKind::LocalIo,
        BridgeError::NotAvailable(_) => ErrorKind::Configuration,
        BridgeError::OperationFailed(_) => ErrorKind::InvalidResponse,
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
