use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    auth::TokenSource,
    error::{DriveError, Result},
    source::DirectorySource,
    types::{ChildPage, DriveEntry, EntryKind, FileContent, FOLDER_MIME},
};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

pub const DEFAULT_PAGE_SIZE: u32 = 100;

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, parents, webViewLink)";

/// Google Drive file list response
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveEntry>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct FolderRef {
    id: String,
}

#[derive(Deserialize)]
struct FolderList {
    #[serde(default)]
    files: Vec<FolderRef>,
}

/// Google Drive backed directory source
///
/// Uses the Drive API v3:
/// - `files.list` for child listings and folder lookup
/// - `files.get?alt=media` for raw downloads
/// - `files.export` for native documents
#[derive(Clone)]
pub struct GoogleDriveSource {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    base_url: String,
    page_size: u32,
}

impl GoogleDriveSource {
    /// Create a source authenticated by `tokens`
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        let client = Client::builder()
            .user_agent("drive-inventory/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            tokens,
            base_url: DRIVE_API_BASE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Point the source at another API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.base_url)
    }

    fn media_url(&self, id: &str) -> String {
        format!("{}/files/{}", self.base_url, urlencoding::encode(id))
    }

    fn export_url(&self, id: &str) -> String {
        format!("{}/files/{}/export", self.base_url, urlencoding::encode(id))
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.tokens.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    /// Send a metadata request, mapping any failure to `RemoteUnavailable`
    ///
    /// A token that cannot be obtained or refreshed counts as a failed call.
    async fn send_listing(&self, request: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(request)
            .await
            .map_err(|e| DriveError::remote(e.to_string()))?
            .send()
            .await
            .map_err(|e| DriveError::remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DriveError::remote(describe_status(status, &text)));
        }
        Ok(response)
    }
}

fn describe_status(status: StatusCode, body: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED => format!("credentials rejected ({}): {}", status, body),
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            format!("access denied or quota exceeded ({}): {}", status, body)
        }
        status => format!("API error {}: {}", status, body),
    }
}

/// Quote a value for use inside a Drive query string literal
fn quote_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl DirectorySource for GoogleDriveSource {
    async fn list_children(&self, folder_id: &str, page_token: Option<&str>) -> Result<ChildPage> {
        let query = format!("'{}' in parents and trashed=false", quote_query(folder_id));
        let page_size = self.page_size.to_string();

        let mut params = vec![
            ("q", query.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", LIST_FIELDS),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let request = self.client.get(self.files_url()).query(&params);
        let response = self.send_listing(request).await?;

        let list: DriveFileList = response
            .json()
            .await
            .map_err(|e| DriveError::remote(format!("Unreadable listing: {}", e)))?;

        Ok(ChildPage {
            entries: list.files,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn find_folder(&self, name: &str) -> Result<Option<String>> {
        let query = format!(
            "name='{}' and mimeType='{}' and trashed=false",
            quote_query(name),
            FOLDER_MIME
        );

        let request = self
            .client
            .get(self.files_url())
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")]);
        let response = self.send_listing(request).await?;

        let list: FolderList = response
            .json()
            .await
            .map_err(|e| DriveError::remote(format!("Unreadable folder lookup: {}", e)))?;

        let id = list.files.into_iter().next().map(|f| f.id);
        debug!(folder = name, found = id.is_some(), "looked up folder by name");
        Ok(id)
    }

    async fn download(&self, id: &str, kind: EntryKind) -> Result<FileContent> {
        let failed = |message: String| DriveError::DownloadFailed {
            id: id.to_string(),
            message,
        };

        let (request, mime_type) = match kind {
            EntryKind::Native(native) => {
                let mime = native.export_mime();
                (
                    self.client.get(self.export_url(id)).query(&[("mimeType", mime)]),
                    Some(mime.to_string()),
                )
            }
            EntryKind::File | EntryKind::Folder => (
                self.client.get(self.media_url(id)).query(&[("alt", "media")]),
                None,
            ),
        };

        let response = self
            .authorized(request)
            .await
            .map_err(|e| failed(e.to_string()))?
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failed(describe_status(status, &text)));
        }

        let mime_type = mime_type.or_else(|| {
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        });

        let mut content = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            content.extend_from_slice(&chunk);
        }

        info!(id = id, bytes = content.len(), "downloaded file");
        Ok(FileContent {
            content: content.freeze(),
            id: id.to_string(),
            mime_type,
        })
    }

    fn identifier(&self) -> String {
        format!("gdrive://{}", self.base_url)
    }
}
