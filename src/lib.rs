//! Workspace façade crate.
//!
//! Hosts that only need the Drive operations can depend on `drive-workspace`
//! instead of wiring `core-service`, `core-runtime` and the bridges by hand.
//!
//! ```ignore
//! use drive_workspace::{CoreConfig, DriveClient};
//!
//! let config = CoreConfig::builder()
//!     .token_path("token.json")
//!     .client_secrets_path("credentials.json")
//!     .build()?;
//! let client = DriveClient::new(config);
//! let entries = client.list_files("root").await?;
//! ```

#[cfg(feature = "desktop-shims")]
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder, MimeTable};
#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, DriveClient, ErrorKind, FileEntry, Result};
