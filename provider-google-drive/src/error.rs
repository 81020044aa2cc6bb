//! Error types for Google Drive provider

use crate::types::ErrorEnvelope;
use thiserror::Error;

/// Reasons Google reports when a request was throttled.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// Reasons Google reports when a quota or storage limit was hit.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "storageQuotaExceeded",
];

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Access token missing, expired or revoked
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// API request returned an error not covered above
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// No response was received
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify a non-2xx response.
    ///
    /// `resource_id` names the file or folder the request addressed and is
    /// carried into [`GoogleDriveError::FileNotFound`].
    pub fn from_response(status: u16, body: &[u8], resource_id: Option<&str>) -> Self {
        let envelope = serde_json::from_slice::<ErrorEnvelope>(body).ok();
        let message = envelope
            .as_ref()
            .map(|e| e.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
        let reason = envelope
            .as_ref()
            .and_then(|e| e.error.errors.first())
            .map(|detail| detail.reason.as_str())
            .unwrap_or_default();

        match status {
            401 => GoogleDriveError::Unauthorized(message),
            403 if RATE_LIMIT_REASONS.contains(&reason) => GoogleDriveError::RateLimited(message),
            403 if QUOTA_REASONS.contains(&reason) => GoogleDriveError::QuotaExceeded(message),
            403 => GoogleDriveError::PermissionDenied(message),
            404 => GoogleDriveError::FileNotFound {
                file_id: resource_id.unwrap_or_default().to_string(),
            },
            429 => GoogleDriveError::RateLimited(message),
            status_code => GoogleDriveError::ApiError {
                status_code,
                message,
            },
        }
    }

    /// Map a bridge failure, keeping transport errors distinguishable.
    pub fn from_bridge(error: bridge_traits::error::BridgeError) -> Self {
        if error.is_transport() {
            GoogleDriveError::NetworkError(error.to_string())
        } else {
            GoogleDriveError::BridgeError(error)
        }
    }
}
