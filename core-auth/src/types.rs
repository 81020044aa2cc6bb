//! Credential types shared by the token file, the OAuth flow and the
//! authorizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Full read/write access to the user's Drive.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const MAX_BUFFER_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Bearer credentials in Google's "authorized user" layout.
///
/// The serialized form is what other Google client libraries read and write,
/// so an existing `token.json` can be reused as-is.
///
/// # Examples
///
/// ```
/// use core_auth::Credentials;
/// use chrono::{Duration, Utc};
///
/// let json = r#"{
///     "token": "ya29.a0",
///     "refresh_token": "1//0g",
///     "client_id": "id.apps.googleusercontent.com",
///     "client_secret": "secret",
///     "scopes": ["https://www.googleapis.com/auth/drive"],
///     "expiry": "2030-01-01T00:00:00Z"
/// }"#;
///
/// let credentials: Credentials = serde_json::from_str(json).unwrap();
/// assert!(credentials.has_scope(core_auth::DRIVE_SCOPE));
/// assert!(!credentials.is_expired(Utc::now(), Duration::minutes(5)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When the access token expires (UTC). `None` means no known expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|granted| granted == scope)
    }

    /// Expired, or expiring within `buffer` of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - buffer,
            None => false,
        }
    }

    /// An access token is present and not expired.
    pub fn is_valid(&self, now: DateTime<Utc>, buffer: chrono::Duration) -> bool {
        self.access_token.is_some() && !self.is_expired(now, buffer)
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Convert a std duration into the signed chrono form used for expiry
    /// arithmetic, capped at ten years.
    pub fn buffer_from(duration: Duration) -> chrono::Duration {
        chrono::Duration::seconds(duration.as_secs().min(MAX_BUFFER_SECS) as i64)
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Credentials {
        Credentials {
            access_token: Some("ya29.token".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![DRIVE_SCOPE.to_string()],
            expiry: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_expiry_with_buffer() {
        let credentials = sample();
        let buffer = chrono::Duration::minutes(5);
        let before = Utc.with_ymd_and_hms(2024, 3, 1, 11, 0, 0).unwrap();
        let inside_buffer = Utc.with_ymd_and_hms(2024, 3, 1, 11, 58, 0).unwrap();

        assert!(!credentials.is_expired(before, buffer));
        assert!(credentials.is_valid(before, buffer));
        assert!(credentials.is_expired(inside_buffer, buffer));
        assert!(!credentials.is_valid(inside_buffer, buffer));
    }

    #[test]
    fn test_missing_expiry_never_expires() {
        let credentials = Credentials {
            expiry: None,
            ..sample()
        };
        assert!(!credentials.is_expired(Utc::now(), chrono::Duration::zero()));
    }

    #[test]
    fn test_missing_access_token_is_invalid() {
        let credentials = Credentials {
            access_token: None,
            ..sample()
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(!credentials.is_valid(now, chrono::Duration::zero()));
        assert!(credentials.can_refresh());
    }

    #[test]
    fn test_serialized_field_names() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["token"], "ya29.token");
        assert_eq!(value["refresh_token"], "1//refresh");
        assert_eq!(value["token_uri"], DEFAULT_TOKEN_URI);
        assert_eq!(value["scopes"][0], DRIVE_SCOPE);
        assert_eq!(value["expiry"], "2024-03-01T12:00:00Z");
    }

    #[test]
    fn test_deserialize_python_written_file() {
        let json = r#"{"token": "ya29", "refresh_token": "1//0g",
            "token_uri": "https://oauth2.googleapis.com/token",
            "client_id": "id", "client_secret": "s",
            "scopes": ["https://www.googleapis.com/auth/drive"],
            "expiry": "2024-03-01T12:00:00.123456Z"}"#;

        let credentials: Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(credentials.access_token(), Some("ya29"));
        assert!(credentials.has_scope(DRIVE_SCOPE));
        assert!(credentials.expiry.is_some());
    }

    #[test]
    fn test_scope_mismatch() {
        let credentials = Credentials {
            scopes: vec!["https://www.googleapis.com/auth/drive.readonly".to_string()],
            ..sample()
        };
        assert!(!credentials.has_scope(DRIVE_SCOPE));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("ya29.token"));
        assert!(!rendered.contains("1//refresh"));
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_buffer_conversion_saturates() {
        assert_eq!(
            Credentials::buffer_from(Duration::from_secs(300)),
            chrono::Duration::seconds(300)
        );
        assert_eq!(
            Credentials::buffer_from(Duration::MAX),
            chrono::Duration::seconds(MAX_BUFFER_SECS as i64)
        );
    }
}
