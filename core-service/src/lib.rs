//! Core service façade.
//!
//! [`DriveClient`] wires a [`CoreConfig`] into the authorizer and the Drive
//! connector and exposes the five operations hosts call: `authorize`,
//! `read_file`, `upload_file`, `list_files` and `create_folder`.
//!
//! Every remote operation first makes sure valid credentials exist, then
//! issues its request(s). Failures are logged at `warn` where they leave the
//! façade and returned as [`CoreError`].
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_service::{CoreConfig, DriveClient};
//!
//! let config = CoreConfig::builder()
//!     .token_path("token.json")
//!     .client_secrets_path("credentials.json")
//!     .build()?;
//! let client = DriveClient::new(config);
//!
//! for entry in client.list_files("root").await? {
//!     println!("{}\t{}", entry.id, entry.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, ErrorKind, Result};

pub use core_auth::{ConsentPresenter, Credentials};
pub use core_runtime::config::{CoreConfig, MimeTable};
pub use provider_google_drive::DownloadProgress;

use bytes::Bytes;
use core_async::fs;
use core_async::sync::CancellationToken;
use core_auth::Authorizer;
use core_runtime::logging::strip_path;
use provider_google_drive::{ConnectorSettings, DriveConnector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Receives download progress, once per chunk.
pub type ProgressObserver = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// A child of a listed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
}

impl From<provider_google_drive::DriveFile> for FileEntry {
    fn from(file: provider_google_drive::DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
        }
    }
}

/// Primary façade exposed to host applications.
pub struct DriveClient {
    config: CoreConfig,
    authorizer: Authorizer,
    connector_settings: ConnectorSettings,
    progress: Option<ProgressObserver>,
}

impl DriveClient {
    pub fn new(config: CoreConfig) -> Self {
        let authorizer = Authorizer::new(&config);
        let connector_settings = ConnectorSettings::from_config(&config);
        Self {
            config,
            authorizer,
            connector_settings,
            progress: None,
        }
    }

    /// Observe download progress in addition to the `Download progress` log
    /// events.
    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    /// Replace how the consent URL is shown to the user.
    pub fn with_presenter(mut self, presenter: Arc<dyn ConsentPresenter>) -> Self {
        self.authorizer = self.authorizer.with_presenter(presenter);
        self
    }

    /// Override the Drive endpoints, for example to target a local fake.
    pub fn with_connector_settings(mut self, settings: ConnectorSettings) -> Self {
        self.connector_settings = settings;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Cancelling this token aborts a pending consent flow.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.authorizer.cancellation_token()
    }

    /// Return valid credentials, loading, refreshing or prompting as needed.
    pub async fn authorize(&self) -> Result<Credentials> {
        logged("authorize", self.authorizer.authorize().await.map_err(CoreError::from))
    }

    /// Delete the stored credentials. Returns whether a file was removed.
    pub async fn sign_out(&self) -> Result<bool> {
        logged("sign_out", self.authorizer.revoke_local().await.map_err(CoreError::from))
    }

    /// Download a file's content.
    #[instrument(skip(self))]
    pub async fn read_file(&self, file_id: &str) -> Result<Bytes> {
        logged("read_file", self.read_file_inner(file_id).await)
    }

    /// Upload a local file, optionally into `parent_id`. Returns the new id.
    ///
    /// The file is staged into the configured staging directory under its
    /// base name. The staged copy is removed afterwards whether or not the
    /// upload succeeded, unless it is the caller's own file.
    #[instrument(skip(self, path), fields(file = %log_name(path.as_ref())))]
    pub async fn upload_file(&self, path: impl AsRef<Path>, parent_id: Option<&str>) -> Result<String> {
        logged("upload_file", self.upload_file_inner(path.as_ref(), parent_id).await)
    }

    /// List the non-trashed children of a folder.
    ///
    /// An empty folder yields an empty vector; a failed request yields `Err`.
    #[instrument(skip(self))]
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<FileEntry>> {
        logged("list_files", self.list_files_inner(folder_id).await)
    }

    /// Create a folder, optionally inside `parent_id`. Returns its id.
    #[instrument(skip(self))]
    pub async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        logged("create_folder", self.create_folder_inner(name, parent_id).await)
    }

    async fn connector(&self) -> Result<DriveConnector> {
        let credentials = self.authorizer.authorize().await?;
        let access_token = credentials.access_token().unwrap_or_default().to_string();

        Ok(DriveConnector::new(
            Arc::clone(&self.config.http_client),
            access_token,
            self.connector_settings.clone(),
        ))
    }

    async fn read_file_inner(&self, file_id: &str) -> Result<Bytes> {
        let connector = self.connector().await?;
        let observer = self.progress.clone();

        let bytes = connector
            .download_media(file_id, move |progress| {
                if let Some(observer) = &observer {
                    observer(progress);
                }
            })
            .await?;
        Ok(bytes)
    }

    async fn upload_file_inner(&self, source: &Path, parent_id: Option<&str>) -> Result<String> {
        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CoreError::InvalidPath(source.to_path_buf()))?
            .to_string();

        let connector = self.connector().await?;
        let staged = self.stage(source, &name).await?;

        let result = self.upload_staged(&connector, &staged, &name, parent_id).await;

        if let Staged::Copy(path) = &staged {
            if let Err(e) = fs::remove_file(path).await {
                warn!(file = %log_name(path), error = %e, "Could not remove staged upload");
            }
        }

        result
    }

    async fn upload_staged(
        &self,
        connector: &DriveConnector,
        staged: &Staged,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<String> {
        let path = staged.path();
        let content = fs::read(path)
            .await
            .map_err(|e| CoreError::io(path, e))?;

        let mime_type = self.config.mime_table.lookup(name);
        let parents: Vec<String> = parent_id.map(str::to_string).into_iter().collect();
        debug!(name = %name, mime_type = %mime_type, size = content.len(), "Uploading staged file");

        let id = connector
            .create_file(name, mime_type, Bytes::from(content), &parents)
            .await?;
        Ok(id)
    }

    /// Copy `source` into the staging directory.
    ///
    /// A different file already occupying the staging name is left alone and
    /// the copy gets a unique name instead.
    async fn stage(&self, source: &Path, name: &str) -> Result<Staged> {
        let source_canonical = fs::canonicalize(source)
            .await
            .map_err(|e| CoreError::io(source, e))?;

        let target = self.config.staging_dir.join(name);
        if let Ok(existing) = fs::canonicalize(&target).await {
            if existing == source_canonical {
                debug!(file = %log_name(source), "Uploading in place");
                return Ok(Staged::InPlace(source.to_path_buf()));
            }
        }

        // An unreadable target counts as occupied.
        let target = if fs::try_exists(&target).await.unwrap_or(true) {
            self.config
                .staging_dir
                .join(format!(".{}.{}", uuid::Uuid::new_v4().simple(), name))
        } else {
            target
        };

        fs::copy(source, &target)
            .await
            .map_err(|e| CoreError::io(source, e))?;
        debug!(from = %log_name(source), to = %log_name(&target), "Staged upload");
        Ok(Staged::Copy(target))
    }

    async fn list_files_inner(&self, folder_id: &str) -> Result<Vec<FileEntry>> {
        let connector = self.connector().await?;
        let files = connector.list_children(folder_id).await?;
        Ok(files.into_iter().map(FileEntry::from).collect())
    }

    async fn create_folder_inner(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        let connector = self.connector().await?;
        let parents: Vec<String> = parent_id.map(str::to_string).into_iter().collect();
        let id = connector.create_folder(name, &parents).await?;
        info!(name = %name, folder_id = %id, "Folder created");
        Ok(id)
    }
}

enum Staged {
    /// The source already sits at the staging path
    InPlace(PathBuf),
    Copy(PathBuf),
}

impl Staged {
    fn path(&self) -> &Path {
        match self {
            Staged::InPlace(path) | Staged::Copy(path) => path,
        }
    }
}

/// Local paths are logged by file name only.
fn log_name(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}

fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(error) = &result {
        warn!(operation, kind = ?error.kind(), error = %error, "Drive operation failed");
    }
    result
}
