use serde::{Deserialize, Serialize};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const PRESENTATION_MIME: &str = "application/vnd.google-apps.presentation";

const PDF_MIME: &str = "application/pdf";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// One node of the remote tree as captured at walk time
///
/// Field names follow the Drive API so that a cache snapshot has the same
/// shape as the records the API returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEntry {
    /// Opaque identifier, unique within the remote store
    pub id: String,
    /// Display name, not unique
    pub name: String,
    /// Raw MIME type the kind is derived from
    pub mime_type: String,
    /// Parent folder ids
    #[serde(default)]
    pub parents: Vec<String>,
    /// Link for viewing the entry in a browser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
}

impl DriveEntry {
    pub fn kind(&self) -> EntryKind {
        EntryKind::from_mime(&self.mime_type)
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == EntryKind::Folder
    }
}

/// Kind of a drive entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
    /// A remote-native document that has to be exported before download
    Native(NativeKind),
}

impl EntryKind {
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type {
            FOLDER_MIME => EntryKind::Folder,
            DOCUMENT_MIME => EntryKind::Native(NativeKind::Document),
            SPREADSHEET_MIME => EntryKind::Native(NativeKind::Spreadsheet),
            PRESENTATION_MIME => EntryKind::Native(NativeKind::Presentation),
            _ => EntryKind::File,
        }
    }
}

/// Native document kinds and the format each is exported to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeKind {
    Document,
    Spreadsheet,
    Presentation,
}

impl NativeKind {
    pub fn export_mime(&self) -> &'static str {
        match self {
            NativeKind::Document | NativeKind::Presentation => PDF_MIME,
            NativeKind::Spreadsheet => XLSX_MIME,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            NativeKind::Document | NativeKind::Presentation => "pdf",
            NativeKind::Spreadsheet => "xlsx",
        }
    }
}

/// Flat, ordered list of every entry found under the root folder
///
/// Order is walk discovery order. Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory {
    entries: Vec<DriveEntry>,
}

impl Inventory {
    pub fn new(entries: Vec<DriveEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DriveEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<DriveEntry> {
        self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DriveEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: DriveEntry) {
        self.entries.push(entry);
    }

    /// First entry with the given id
    pub fn find(&self, id: &str) -> Option<&DriveEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

impl FromIterator<DriveEntry> for Inventory {
    fn from_iter<T: IntoIterator<Item = DriveEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Inventory {
    type Item = DriveEntry;
    type IntoIter = std::vec::IntoIter<DriveEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a DriveEntry;
    type IntoIter = std::slice::Iter<'a, DriveEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// One page of a folder listing
#[derive(Debug, Clone, Default)]
pub struct ChildPage {
    /// Children in remote listing order
    pub entries: Vec<DriveEntry>,
    /// Continuation token, `None` on the last page
    pub next_page_token: Option<String>,
}

/// Downloaded or exported file content
#[derive(Debug, Clone)]
pub struct FileContent {
    /// The raw bytes of the file
    pub content: bytes::Bytes,
    /// Id of the entry the bytes belong to
    pub id: String,
    /// MIME type of `content`; the export format for native documents
    pub mime_type: Option<String>,
}
