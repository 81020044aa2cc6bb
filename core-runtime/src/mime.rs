//! File-extension to MIME type mapping used when uploading.
//!
//! The default table keeps the historical behaviour of the service, where
//! `jpg` and `png` are announced as `image/gif`. Hosts that want accurate
//! types opt in with [`MimeTable::corrected`] or override single entries.

use std::collections::HashMap;

/// MIME type used for any extension the table does not know.
pub const FALLBACK_MIME: &str = "text/plain";

/// Extension → MIME type table with a fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeTable {
    entries: HashMap<String, String>,
    fallback: String,
}

impl Default for MimeTable {
    fn default() -> Self {
        Self::historical()
    }
}

impl MimeTable {
    /// Table with no entries; every lookup yields `fallback`.
    pub fn empty(fallback: impl Into<String>) -> Self {
        Self {
            entries: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    /// The mapping uploads have always used.
    pub fn historical() -> Self {
        Self::empty(FALLBACK_MIME)
            .with_mapping("jpg", "image/gif")
            .with_mapping("png", "image/gif")
            .with_mapping("html", "text/html")
            .with_mapping("htm", "text/html")
            .with_mapping("json", "application/json")
    }

    /// Image types mapped to their real MIME types.
    pub fn corrected() -> Self {
        Self::historical()
            .with_mapping("jpg", "image/jpeg")
            .with_mapping("jpeg", "image/jpeg")
            .with_mapping("png", "image/png")
            .with_mapping("gif", "image/gif")
            .with_mapping("pdf", "application/pdf")
            .with_mapping("csv", "text/csv")
    }

    /// Add or replace the entry for `extension` (case-insensitive).
    pub fn with_mapping(mut self, extension: &str, mime: impl Into<String>) -> Self {
        self.entries
            .insert(extension.to_ascii_lowercase(), mime.into());
        self
    }

    pub fn with_fallback(mut self, mime: impl Into<String>) -> Self {
        self.fallback = mime.into();
        self
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Text after the last `.` of `file_name`, or the whole name when it has
    /// no dot.
    pub fn extension_of(file_name: &str) -> &str {
        file_name.rsplit('.').next().unwrap_or(file_name)
    }

    /// MIME type for a base file name such as `photo.JPG`.
    pub fn lookup(&self, file_name: &str) -> &str {
        let extension = Self::extension_of(file_name).to_ascii_lowercase();
        self.entries
            .get(&extension)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }
}
