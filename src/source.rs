use async_trait::async_trait;
use crate::{error::Result, types::{ChildPage, EntryKind, FileContent}};

/// Core abstraction for the remote directory
///
/// Implementors provide read-only access to a folder graph addressed by
/// opaque ids (Google Drive, or an in-memory fixture in tests)
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// List one page of the non-trashed children of a folder
    ///
    /// `page_token` is the continuation token returned by the previous page,
    /// or `None` for the first page.
    /// Returns `DriveError::RemoteUnavailable` if the listing call fails,
    /// including when no access token can be obtained for it
    async fn list_children(&self, folder_id: &str, page_token: Option<&str>) -> Result<ChildPage>;

    /// Find a folder by exact name, returning its id
    async fn find_folder(&self, name: &str) -> Result<Option<String>>;

    /// Fetch the content of a file, exporting native documents
    ///
    /// Returns `DriveError::DownloadFailed` if the content cannot be retrieved
    async fn download(&self, id: &str, kind: EntryKind) -> Result<FileContent>;

    /// Get a human-readable identifier for this source (for logging/debugging)
    fn identifier(&self) -> String;
}
