use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No client-secret file configured; one is required to run the consent flow")]
    MissingClientSecrets,

    #[error("Invalid client-secret file {}: {reason}", path.display())]
    InvalidClientSecrets { path: PathBuf, reason: String },

    #[error("Consent was not completed within {0:?}")]
    ConsentTimedOut(Duration),

    #[error("Consent flow was cancelled")]
    ConsentCancelled,

    #[error("Consent was denied: {0}")]
    ConsentDenied(String),

    #[error("Malformed consent redirect: {0}")]
    InvalidCallback(String),

    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },

    #[error("Authorization code exchange failed: {0}")]
    InvalidAuthCode(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to write credentials: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether the failure came from the transport rather than the OAuth
    /// server or the user.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::NetworkError(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
