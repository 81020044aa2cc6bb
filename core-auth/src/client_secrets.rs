//! OAuth client-secret file as downloaded from the Google Cloud console.

use crate::error::{AuthError, Result};
use crate::types::{DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// One application block (`installed` or `web`) of a client-secret file.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse the file contents. Desktop (`installed`) clients win over `web`
    /// when a file carries both.
    pub fn from_json(json: &str) -> std::result::Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" block".to_string())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = core_async::fs::read_to_string(path).await.map_err(|e| {
            AuthError::InvalidClientSecrets {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let secrets = Self::from_json(&contents).map_err(|reason| AuthError::InvalidClientSecrets {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(client_id = %secrets.client_id, "Loaded client secrets");
        Ok(secrets)
    }
}

impl fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .field("redirect_uris", &self.redirect_uris)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALLED: &str = r#"{"installed": {
        "client_id": "123.apps.googleusercontent.com",
        "project_id": "demo",
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_secret": "GOCSPX-abc",
        "redirect_uris": ["http://localhost"]
    }}"#;

    #[test]
    fn test_parse_installed_block() {
        let secrets = ClientSecrets::from_json(INSTALLED).unwrap();

        assert_eq!(secrets.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secrets.client_secret, "GOCSPX-abc");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(secrets.redirect_uris, vec!["http://localhost".to_string()]);
    }

    #[test]
    fn test_parse_web_block_with_defaults() {
        let secrets =
            ClientSecrets::from_json(r#"{"web": {"client_id": "web-client"}}"#).unwrap();

        assert_eq!(secrets.client_id, "web-client");
        assert_eq!(secrets.auth_uri, DEFAULT_AUTH_URI);
        assert!(secrets.client_secret.is_empty());
    }

    #[test]
    fn test_rejects_unknown_layout() {
        let err = ClientSecrets::from_json(r#"{"service_account": {}}"#).unwrap_err();
        assert!(err.contains("installed"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let secrets = ClientSecrets::from_json(INSTALLED).unwrap();
        assert!(!format!("{:?}", secrets).contains("GOCSPX-abc"));
    }

    #[core_async::test]
    async fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, INSTALLED).unwrap();

        let secrets = ClientSecrets::load(&path).await.unwrap();
        assert_eq!(secrets.client_secret, "GOCSPX-abc");
    }

    #[core_async::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let err = ClientSecrets::load(&path).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidClientSecrets { .. }));
    }
}
