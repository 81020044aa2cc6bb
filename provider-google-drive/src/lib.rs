//! # Google Drive Provider
//!
//! Request layer over Google Drive API v3.
//!
//! ## Overview
//!
//! This crate provides:
//! - Chunked media downloads using `Range` requests
//! - Multipart file creation (metadata and content in one request)
//! - Paginated listing of a folder's children
//! - Folder creation
//! - Mapping of Google's error envelope onto [`GoogleDriveError`]

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{
    ConnectorSettings, DownloadProgress, DriveConnector, DRIVE_API_BASE, DRIVE_UPLOAD_BASE,
    FOLDER_MIME_TYPE,
};
pub use error::{GoogleDriveError, Result};
pub use types::DriveFile;
