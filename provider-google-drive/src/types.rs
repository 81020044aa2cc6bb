//! Google Drive API response types
//!
//! Data structures for (de)serializing Google Drive API v3 payloads.

use serde::{Deserialize, Serialize};

/// Google Drive API file resource, restricted to the fields we request.
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type (only present when requested)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// Files in this page. Drive omits the field for an empty result.
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response of a create request issued with `fields=id`.
#[derive(Debug, Deserialize)]
pub struct CreatedFile {
    pub id: String,
}

/// Metadata sent when creating a file or folder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFileMetadata<'a> {
    pub name: &'a str,

    pub mime_type: &'a str,

    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub parents: &'a [String],
}

/// Google's JSON error envelope: `{"error": {"code", "message", "errors"}}`
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub reason: String,
}
