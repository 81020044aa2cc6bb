//! Credentials File Storage
//!
//! Persists [`Credentials`] as a single JSON file at a caller-chosen path.
//!
//! - Token values are never logged
//! - A file that cannot be parsed is reported and treated as absent, so the
//!   next authorization overwrites it
//! - Every save rewrites the whole file
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::TokenStore;
//! # async fn example(credentials: core_auth::Credentials) -> core_auth::Result<()> {
//! let store = TokenStore::new("token.json");
//!
//! store.save(&credentials).await?;
//! let loaded = store.load().await?;
//! assert!(loaded.is_some());
//!
//! store.delete().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::Credentials;
use core_async::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-backed credential storage
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials from disk.
    ///
    /// Returns `Ok(None)` when the file does not exist or is not a valid
    /// credentials document. Other read failures are returned.
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No stored credentials");
                return Ok(None);
            }
            Err(e) => return Err(AuthError::Io(e)),
        };

        match serde_json::from_str::<Credentials>(&contents) {
            Ok(credentials) => {
                debug!(path = %self.path.display(), "Loaded stored credentials");
                Ok(Some(credentials))
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Stored credentials are corrupt, ignoring them"
                );
                Ok(None)
            }
        }
    }

    /// Write credentials, replacing any previous file.
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_vec_pretty(credentials)
            .map_err(|e| AuthError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(&self.path, json).await?;
        restrict_permissions(&self.path).await;

        info!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    /// Remove the credentials file. Returns whether a file was removed.
    pub async fn delete(&self) -> Result<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed stored credentials");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::Io(e)),
        }
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await {
        warn!(path = %path.display(), error = %e, "Could not restrict credentials file permissions");
    }
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) {}
