//! Google Drive API connector implementation
//!
//! Thin request/response layer over Drive API v3. Each method issues one
//! request, or a loop of requests for chunked downloads and paginated
//! listings, and maps non-2xx statuses into [`GoogleDriveError`].

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bytes::{Bytes, BytesMut};
use core_runtime::config::{CoreConfig, DEFAULT_CHUNK_SIZE, DEFAULT_PAGE_SIZE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{GoogleDriveError, Result};
use crate::types::{CreatedFile, DriveFile, FilesListResponse, NewFileMetadata};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive media upload base URL
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type Drive uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for listed children
const LIST_FIELDS: &str = "nextPageToken, files(id, name)";

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
const MEDIA_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables for a [`DriveConnector`].
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub api_base: String,
    pub upload_base: String,
    /// Bytes requested per `Range` request when downloading
    pub chunk_size: u64,
    /// `pageSize` sent with list requests
    pub page_size: u32,
    pub retry_policy: RetryPolicy,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            retry_policy: RetryPolicy::none(),
        }
    }
}

impl ConnectorSettings {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            chunk_size: config.download_chunk_size,
            page_size: config.page_size,
            retry_policy: config.retry_policy.clone(),
            ..Self::default()
        }
    }

    /// Point both API bases at another host (used against local fakes).
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }
}

/// Progress of a chunked download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_received: u64,
    /// Total size reported by the server, when known
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    /// Completed fraction in `[0, 1]`. Unknown totals report `0`.
    pub fn fraction(&self) -> f64 {
        match self.total_bytes {
            Some(0) => 1.0,
            Some(total) => (self.bytes_received as f64 / total as f64).min(1.0),
            None => 0.0,
        }
    }
}

/// Google Drive API connector
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::{ConnectorSettings, DriveConnector};
///
/// let connector = DriveConnector::new(http_client, access_token, ConnectorSettings::default());
/// let children = connector.list_children("root").await?;
/// ```
pub struct DriveConnector {
    http_client: Arc<dyn HttpClient>,
    access_token: String,
    settings: ConnectorSettings,
}

impl DriveConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        access_token: impl Into<String>,
        settings: ConnectorSettings,
    ) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &ConnectorSettings {
        &self.settings
    }

    /// Download a file's content with `alt=media`.
    ///
    /// The body is fetched in `Range` chunks of `chunk_size` bytes until the
    /// total from `Content-Range` is reached. A plain `200` ends the download
    /// with the whole body. `on_progress` is called once per chunk.
    #[instrument(skip(self, on_progress), fields(file_id = %file_id))]
    pub async fn download_media<F>(&self, file_id: &str, mut on_progress: F) -> Result<Bytes>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        let url = format!(
            "{}/files/{}?alt=media",
            self.settings.api_base,
            urlencoding::encode(file_id)
        );
        let chunk_size = self.settings.chunk_size.max(1);

        let mut buffer = BytesMut::new();
        let mut total_bytes: Option<u64> = None;

        loop {
            let start = buffer.len() as u64;
            let end = start + chunk_size - 1;
            let request = self
                .authorized(HttpMethod::Get, &url)
                .header("Range", format!("bytes={}-{}", start, end))
                .timeout(MEDIA_TIMEOUT);

            let response = self.send(request).await?;

            // Past the end: an empty file, or a total that was a chunk multiple.
            if response.status == 416 {
                debug!(offset = start, "Range not satisfiable, download complete");
                break;
            }
            let response = check(response, Some(file_id))?;

            if response.status != 206 {
                buffer = BytesMut::from(&response.body[..]);
                let progress = DownloadProgress {
                    bytes_received: buffer.len() as u64,
                    total_bytes: Some(buffer.len() as u64),
                };
                report(file_id, progress, &mut on_progress);
                break;
            }

            let received = response.body.len() as u64;
            if total_bytes.is_none() {
                total_bytes = response.header("Content-Range").and_then(parse_total);
            }
            buffer.extend_from_slice(&response.body);

            let progress = DownloadProgress {
                bytes_received: buffer.len() as u64,
                total_bytes,
            };
            report(file_id, progress, &mut on_progress);

            let reached_total = total_bytes.is_some_and(|total| buffer.len() as u64 >= total);
            if reached_total || received == 0 || received < chunk_size {
                break;
            }
        }

        info!(bytes = buffer.len(), "Download complete");
        Ok(buffer.freeze())
    }

    /// Create a file with content in one multipart request. Returns its id.
    #[instrument(skip(self, content, parents), fields(name = %name, mime_type = %mime_type, size = content.len()))]
    pub async fn create_file(
        &self,
        name: &str,
        mime_type: &str,
        content: Bytes,
        parents: &[String],
    ) -> Result<String> {
        let metadata = NewFileMetadata {
            name,
            mime_type,
            parents,
        };
        let metadata = serde_json::to_vec(&metadata)
            .map_err(|e| GoogleDriveError::ParseError(format!("Failed to encode metadata: {}", e)))?;

        let boundary = format!("drive-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, mime_type, &content);

        let url = format!(
            "{}/files?uploadType=multipart&fields=id",
            self.settings.upload_base
        );
        let request = self
            .authorized(HttpMethod::Post, &url)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .timeout(MEDIA_TIMEOUT);

        let response = check(self.send(request).await?, parents.first().map(String::as_str))?;
        let created: CreatedFile = parse(&response, "created file")?;

        info!(file_id = %created.id, "Uploaded file");
        Ok(created.id)
    }

    /// Fetch one page of the non-trashed children of `folder_id`.
    #[instrument(skip(self), fields(folder_id = %folder_id))]
    pub async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<(Vec<DriveFile>, Option<String>)> {
        let query = format!("'{}' in parents and trashed = false", escape_query_value(folder_id));

        let mut request = self
            .authorized(HttpMethod::Get, &format!("{}/files", self.settings.api_base))
            .query("q", &query)
            .query("fields", LIST_FIELDS)
            .query("pageSize", &self.settings.page_size.to_string());
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }
        let request = request
            .header("Accept", "application/json")
            .timeout(METADATA_TIMEOUT);

        let response = check(self.send(request).await?, Some(folder_id))?;
        let page: FilesListResponse = parse(&response, "files list")?;

        debug!(count = page.files.len(), has_more = page.next_page_token.is_some(), "Listed page");
        Ok((page.files, page.next_page_token))
    }

    /// List every non-trashed child of `folder_id`, following `nextPageToken`.
    ///
    /// Pages are concatenated in the order the server returns them.
    pub async fn list_children(&self, folder_id: &str) -> Result<Vec<DriveFile>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let (page, next) = self.list_page(folder_id, page_token.as_deref()).await?;
            files.extend(page);

            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(folder_id = %folder_id, count = files.len(), "Listed folder");
        Ok(files)
    }

    /// Create a folder. Returns its id.
    #[instrument(skip(self, parents), fields(name = %name))]
    pub async fn create_folder(&self, name: &str, parents: &[String]) -> Result<String> {
        let metadata = NewFileMetadata {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents,
        };
        let url = format!("{}/files?fields=id", self.settings.api_base);
        let request = self
            .authorized(HttpMethod::Post, &url)
            .json(&metadata)?
            .timeout(METADATA_TIMEOUT);

        let response = check(self.send(request).await?, parents.first().map(String::as_str))?;
        let created: CreatedFile = parse(&response, "created folder")?;

        info!(folder_id = %created.id, "Created folder");
        Ok(created.id)
    }

    fn authorized(&self, method: HttpMethod, url: &str) -> HttpRequest {
        HttpRequest::new(method, url).bearer_token(&self.access_token)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.http_client
            .execute_with_retry(request, self.settings.retry_policy.clone())
            .await
            .map_err(GoogleDriveError::from_bridge)
    }
}

fn check(response: HttpResponse, resource_id: Option<&str>) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(GoogleDriveError::from_response(
            response.status,
            &response.body,
            resource_id,
        ))
    }
}

fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)))
}

fn report<F: FnMut(DownloadProgress)>(file_id: &str, progress: DownloadProgress, on_progress: &mut F) {
    info!(
        file_id = %file_id,
        percent = (progress.fraction() * 100.0).round() as u32,
        bytes = progress.bytes_received,
        "Download progress"
    );
    on_progress(progress);
}

/// Total length from `Content-Range: bytes 0-99/1234`. `*` yields `None`.
fn parse_total(content_range: &str) -> Option<u64> {
    content_range.rsplit_once('/')?.1.trim().parse().ok()
}

/// Quote a value for use inside a single-quoted Drive query literal.
fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Build a `multipart/related` body: JSON metadata part, then media part.
fn multipart_related(boundary: &str, metadata: &[u8], mime_type: &str, content: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(metadata.len() + content.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--", boundary).as_bytes());
    body.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::BridgeError;
    use mockall::mock;
    use mockall::Sequence;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
        }
    }

    fn connector(mock_http: MockHttpClient, chunk_size: u64) -> DriveConnector {
        let settings = ConnectorSettings {
            chunk_size,
            page_size: 2,
            ..ConnectorSettings::default()
        };
        DriveConnector::new(Arc::new(mock_http), "test_token", settings)
    }

    fn json(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(status, body.to_string())
    }

    #[test]
    fn test_escape_query_value() {
        assert_eq!(escape_query_value("abc"), "abc");
        assert_eq!(escape_query_value("it's"), "it\\'s");
        assert_eq!(escape_query_value("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_parse_total() {
        assert_eq!(parse_total("bytes 0-9/25"), Some(25));
        assert_eq!(parse_total("bytes 0-9/*"), None);
        assert_eq!(parse_total("garbage"), None);
    }

    #[test]
    fn test_progress_fraction() {
        let half = DownloadProgress {
            bytes_received: 5,
            total_bytes: Some(10),
        };
        let empty = DownloadProgress {
            bytes_received: 0,
            total_bytes: Some(0),
        };
        assert_eq!(half.fraction(), 0.5);
        assert_eq!(empty.fraction(), 1.0);
    }

    #[test]
    fn test_multipart_layout() {
        let body = multipart_related("b", br#"{"name":"a.txt"}"#, "text/plain", b"hello");
        let expected = "--b\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n\
                        {\"name\":\"a.txt\"}\r\n--b\r\nContent-Type: text/plain\r\n\r\nhello\r\n--b--";
        assert_eq!(&body[..], expected.as_bytes());
    }

    #[core_async::test]
    async fn test_download_in_range_chunks() {
        let content: Vec<u8> = (0u8..25).collect();
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        for (start, end) in [(0usize, 10usize), (10, 20), (20, 25)] {
            let chunk = content[start..end].to_vec();
            mock_http
                .expect_execute()
                .times(1)
                .in_sequence(&mut seq)
                .returning(move |req| {
                    assert!(req.url.ends_with("/files/file1?alt=media"));
                    assert_eq!(req.header_value("Authorization"), Some("Bearer test_token"));
                    assert_eq!(
                        req.header_value("Range").unwrap(),
                        format!("bytes={}-{}", start, start + 9)
                    );
                    Ok(HttpResponse::new(206, chunk.clone()).with_header(
                        "Content-Range",
                        format!("bytes {}-{}/25", start, end - 1),
                    ))
                });
        }

        let mut fractions = Vec::new();
        let data = connector(mock_http, 10)
            .download_media("file1", |p| fractions.push(p.fraction()))
            .await
            .unwrap();

        assert_eq!(&data[..], &content[..]);
        assert_eq!(fractions, vec![0.4, 0.8, 1.0]);
    }

    #[core_async::test]
    async fn test_download_full_body_on_200() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, vec![1, 2, 3])));

        let mut calls = 0;
        let data = connector(mock_http, 10)
            .download_media("file1", |p| {
                calls += 1;
                assert_eq!(p.fraction(), 1.0);
            })
            .await
            .unwrap();

        assert_eq!(&data[..], &[1, 2, 3]);
        assert_eq!(calls, 1);
    }

    #[core_async::test]
    async fn test_download_empty_file() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(416, Vec::new())));

        let data = connector(mock_http, 10)
            .download_media("empty", |_| {})
            .await
            .unwrap();

        assert!(data.is_empty());
    }

    #[core_async::test]
    async fn test_download_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json(404, r#"{"error": {"code": 404, "message": "File not found: nope."}}"#)));

        let error = connector(mock_http, 10)
            .download_media("nope", |_| {})
            .await
            .unwrap_err();

        match error {
            GoogleDriveError::FileNotFound { file_id } => assert_eq!(file_id, "nope"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[core_async::test]
    async fn test_list_children_follows_pages() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert!(req.url.contains("q=%27folder%27%20in%20parents%20and%20trashed%20%3D%20false"));
                assert!(req.url.contains("pageSize=2"));
                assert!(!req.url.contains("pageToken"));
                Ok(json(
                    200,
                    r#"{"nextPageToken": "p2", "files": [{"id": "1", "name": "a"}, {"id": "2", "name": "b"}]}"#,
                ))
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert!(req.url.contains("pageToken=p2"));
                Ok(json(200, r#"{"files": [{"id": "3", "name": "c"}]}"#))
            });

        let files = connector(mock_http, 10).list_children("folder").await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[core_async::test]
    async fn test_list_empty_folder() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json(200, r#"{"files": []}"#)));

        let files = connector(mock_http, 10).list_children("empty").await.unwrap();
        assert!(files.is_empty());
    }

    #[core_async::test]
    async fn test_list_transport_failure() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Connection("refused".to_string())));

        let error = connector(mock_http, 10).list_children("root").await.unwrap_err();
        assert!(matches!(error, GoogleDriveError::NetworkError(_)));
    }

    #[core_async::test]
    async fn test_create_file_multipart() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Post);
            assert!(req.url.starts_with(DRIVE_UPLOAD_BASE));
            assert!(req.url.ends_with("/files?uploadType=multipart&fields=id"));

            let content_type = req.header_value("Content-Type").unwrap();
            let boundary = content_type
                .strip_prefix("multipart/related; boundary=")
                .unwrap();
            let body = String::from_utf8(req.body.clone().unwrap().to_vec()).unwrap();

            assert!(body.starts_with(&format!("--{}\r\n", boundary)));
            assert!(body.contains(r#""name":"notes.txt""#));
            assert!(body.contains(r#""parents":["folder1"]"#));
            assert!(body.contains("Content-Type: text/plain\r\n\r\nhello world\r\n"));
            assert!(body.ends_with(&format!("--{}--", boundary)));

            Ok(json(200, r#"{"id": "new-file"}"#))
        });

        let id = connector(mock_http, 10)
            .create_file(
                "notes.txt",
                "text/plain",
                Bytes::from_static(b"hello world"),
                &["folder1".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(id, "new-file");
    }

    #[core_async::test]
    async fn test_create_file_quota_exceeded() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(json(
                403,
                r#"{"error": {"code": 403, "message": "quota", "errors": [{"reason": "storageQuotaExceeded"}]}}"#,
            ))
        });

        let error = connector(mock_http, 10)
            .create_file("big.bin", "text/plain", Bytes::from_static(b"x"), &[])
            .await
            .unwrap_err();

        assert!(matches!(error, GoogleDriveError::QuotaExceeded(_)));
    }

    #[core_async::test]
    async fn test_create_folder() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.ends_with("/files?fields=id"));
            let body: serde_json::Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(
                body,
                serde_json::json!({"name": "X", "mimeType": FOLDER_MIME_TYPE})
            );
            Ok(json(200, r#"{"id": "folder-x"}"#))
        });

        let id = connector(mock_http, 10).create_folder("X", &[]).await.unwrap();
        assert_eq!(id, "folder-x");
    }

    #[core_async::test]
    async fn test_unauthorized() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(json(401, r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#)));

        let error = connector(mock_http, 10).create_folder("X", &[]).await.unwrap_err();
        assert!(matches!(error, GoogleDriveError::Unauthorized(_)));
    }

    #[core_async::test]
    async fn test_retry_policy_is_applied() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json(503, "unavailable")));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json(200, r#"{"id": "after-retry"}"#)));

        let settings = ConnectorSettings {
            retry_policy: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                use_exponential_backoff: false,
            },
            ..ConnectorSettings::default()
        };
        let connector = DriveConnector::new(Arc::new(mock_http), "t", settings);

        assert_eq!(connector.create_folder("X", &[]).await.unwrap(), "after-retry");
    }
}
