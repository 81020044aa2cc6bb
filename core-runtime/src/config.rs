//! # Core Configuration Module
//!
//! Provides configuration management for the Drive service.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the injected bridges and every tunable the service
//! reads. It enforces fail-fast validation so a bad chunk size or a missing
//! token path surfaces at startup instead of halfway through a download.
//!
//! ## Required Settings
//!
//! - `token_path` - where credentials are loaded from and persisted to
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `Clock` - time source for expiry checks (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, a `ReqwestHttpClient` is
//! injected automatically if no HTTP client is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, MimeTable};
//!
//! let config = CoreConfig::builder()
//!     .token_path("token.json")
//!     .client_secrets_path("credentials.json")
//!     .mime_table(MimeTable::corrected())
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, HttpClient, RetryPolicy, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use crate::mime::{MimeTable, FALLBACK_MIME};

/// Chunk sizes are multiples of 256 KiB, the granularity Drive uses for chunked transfers.
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;

/// Default download chunk size (100 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Default number of entries requested per list page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound the Drive API accepts for `pageSize`.
pub const MAX_PAGE_SIZE: u32 = 1000;

pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// Core configuration for the Drive service.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Credentials file (Google authorized-user JSON)
    pub token_path: PathBuf,

    /// OAuth client-secret file, only read when a consent flow is needed
    pub client_secrets_path: Option<PathBuf>,

    /// HTTP client for Drive and OAuth requests
    pub http_client: Arc<dyn HttpClient>,

    /// Time source for credential expiry
    pub clock: Arc<dyn Clock>,

    /// Extension to MIME mapping used by uploads
    pub mime_table: MimeTable,

    /// Directory uploads are staged in before sending
    pub staging_dir: PathBuf,

    /// Bytes requested per ranged download request
    pub download_chunk_size: u64,

    /// Entries requested per list page
    pub page_size: u32,

    /// Retry policy applied to every Drive and token request
    pub retry_policy: RetryPolicy,

    /// How long to wait for the user to finish consent in the browser
    pub consent_timeout: Duration,

    /// Loopback port for the consent redirect, 0 for an ephemeral port
    pub loopback_port: u16,

    /// Launch the system browser during consent
    pub open_browser: bool,

    /// Treat credentials as expired this long before their real expiry
    pub token_expiry_buffer: Duration,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("token_path", &self.token_path)
            .field("client_secrets_path", &self.client_secrets_path)
            .field("http_client", &"HttpClient { ... }")
            .field("clock", &"Clock { ... }")
            .field("mime_table", &self.mime_table)
            .field("staging_dir", &self.staging_dir)
            .field("download_chunk_size", &self.download_chunk_size)
            .field("page_size", &self.page_size)
            .field("retry_policy", &self.retry_policy)
            .field("consent_timeout", &self.consent_timeout)
            .field("loopback_port", &self.loopback_port)
            .field("open_browser", &self.open_browser)
            .field("token_expiry_buffer", &self.token_expiry_buffer)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Token path is not empty
    /// - Chunk size is a positive multiple of 256 KiB
    /// - Page size is within `1..=1000`
    /// - Consent timeout is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.token_path.as_os_str().is_empty() {
            return Err(Error::Config("Token path cannot be empty".to_string()));
        }

        if self.download_chunk_size == 0 || self.download_chunk_size % CHUNK_ALIGNMENT != 0 {
            return Err(Error::Config(format!(
                "Download chunk size must be a positive multiple of {} bytes (got {})",
                CHUNK_ALIGNMENT, self.download_chunk_size
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {} (got {})",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.consent_timeout.is_zero() {
            return Err(Error::Config(
                "Consent timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to reach Google Drive. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Other hosts: inject an implementation with .http_client()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: e.to_string(),
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    token_path: Option<PathBuf>,
    client_secrets_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    mime_table: Option<MimeTable>,
    staging_dir: Option<PathBuf>,
    download_chunk_size: Option<u64>,
    page_size: Option<u32>,
    retry_policy: Option<RetryPolicy>,
    consent_timeout: Option<Duration>,
    loopback_port: Option<u16>,
    open_browser: Option<bool>,
    token_expiry_buffer: Option<Duration>,
}

impl CoreConfigBuilder {
    /// Sets the credentials file path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .token_path("/home/me/.config/drive/token.json");
    /// ```
    pub fn token_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.token_path = Some(path.into());
        self
    }

    /// Sets the OAuth client-secret file used for first-time consent.
    pub fn client_secrets_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.client_secrets_path = Some(path.into());
        self
    }

    /// Injects the HTTP client used for every remote call.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn mime_table(mut self, table: MimeTable) -> Self {
        self.mime_table = Some(table);
        self
    }

    /// Directory uploads are copied into before sending (default: `.`).
    pub fn staging_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Bytes per ranged download request. Must be a multiple of 256 KiB.
    pub fn download_chunk_size(mut self, bytes: u64) -> Self {
        self.download_chunk_size = Some(bytes);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Retry policy for remote calls (default: single attempt).
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = Some(timeout);
        self
    }

    pub fn loopback_port(mut self, port: u16) -> Self {
        self.loopback_port = Some(port);
        self
    }

    pub fn open_browser(mut self, enabled: bool) -> Self {
        self.open_browser = Some(enabled);
        self
    }

    pub fn token_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.token_expiry_buffer = Some(buffer);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - The token path is missing
    /// - No HTTP client is provided and no desktop default is available
    /// - Any value fails [`CoreConfig::validate`]
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use core_runtime::config::CoreConfig;
    /// let config = CoreConfig::builder()
    ///     .token_path("token.json")
    ///     .build()?;
    /// # Ok::<(), core_runtime::Error>(())
    /// ```
    pub fn build(self) -> Result<CoreConfig> {
        let token_path = self.token_path.ok_or_else(|| {
            Error::Config("Token path is required. Use .token_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            token_path,
            client_secrets_path: self.client_secrets_path,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            mime_table: self.mime_table.unwrap_or_default(),
            staging_dir: self.staging_dir.unwrap_or_else(|| PathBuf::from(".")),
            download_chunk_size: self.download_chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            retry_policy: self.retry_policy.unwrap_or_else(RetryPolicy::none),
            consent_timeout: self.consent_timeout.unwrap_or(DEFAULT_CONSENT_TIMEOUT),
            loopback_port: self.loopback_port.unwrap_or(0),
            open_browser: self.open_browser.unwrap_or(true),
            token_expiry_buffer: self.token_expiry_buffer.unwrap_or(DEFAULT_EXPIRY_BUFFER),
        };

        config.validate()?;

        Ok(config)
    }
}
