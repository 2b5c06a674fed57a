/// Integration tests for the inventory walk, cache and search
///
/// These tests run against an in-memory directory source

use drive_inventory::{
    search, ChildPage, DirectorySource, DriveEntry, DriveError, EntryKind, FileContent,
    InventoryCache, InventoryOrigin, InventoryResolver, JsonFileCache, MemoryCache, SearchQuery,
    TreeFetcher,
};
use drive_inventory::types::FOLDER_MIME;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// Mock source for testing without network access
struct MockDirectorySource {
    pages: HashMap<String, Vec<Vec<DriveEntry>>>,
    folders: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    failing: HashSet<String>,
    listings: AtomicUsize,
}

impl MockDirectorySource {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            folders: HashMap::new(),
            files: HashMap::new(),
            failing: HashSet::new(),
            listings: AtomicUsize::new(0),
        }
    }

    fn add_root(&mut self, name: &str, id: &str) {
        self.folders.insert(name.to_string(), id.to_string());
    }

    fn add_folder(&mut self, id: &str, pages: Vec<Vec<DriveEntry>>) {
        self.pages.insert(id.to_string(), pages);
    }

    fn add_content(&mut self, id: &str, content: &[u8]) {
        self.files.insert(id.to_string(), content.to_vec());
    }

    fn fail_listing(&mut self, id: &str) {
        self.failing.insert(id.to_string());
    }
}

#[async_trait::async_trait]
impl DirectorySource for MockDirectorySource {
    async fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> drive_inventory::Result<ChildPage> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(folder_id) {
            return Err(DriveError::RemoteUnavailable {
                message: format!("listing {} failed", folder_id),
            });
        }

        let pages = self.pages.get(folder_id).cloned().unwrap_or_default();
        let index = page_token
            .and_then(|t| t.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        Ok(ChildPage {
            entries: pages.get(index).cloned().unwrap_or_default(),
            next_page_token: (index + 1 < pages.len()).then(|| format!("page-{}", index + 1)),
        })
    }

    async fn find_folder(&self, name: &str) -> drive_inventory::Result<Option<String>> {
        Ok(self.folders.get(name).cloned())
    }

    async fn download(&self, id: &str, kind: EntryKind) -> drive_inventory::Result<FileContent> {
        let content = self
            .files
            .get(id)
            .ok_or_else(|| DriveError::DownloadFailed {
                id: id.to_string(),
                message: "not found".to_string(),
            })?;
        let mime_type = match kind {
            EntryKind::Native(native) => Some(native.export_mime().to_string()),
            _ => None,
        };
        Ok(FileContent {
            content: bytes::Bytes::from(content.clone()),
            id: id.to_string(),
            mime_type,
        })
    }

    fn identifier(&self) -> String {
        "mock".to_string()
    }
}

fn file(id: &str, name: &str, parent: &str) -> DriveEntry {
    DriveEntry {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: "application/pdf".to_string(),
        parents: vec![parent.to_string()],
        web_view_link: Some(format!("https://drive.google.com/file/d/{}/view", id)),
    }
}

fn folder(id: &str, name: &str, parent: &str) -> DriveEntry {
    DriveEntry {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: FOLDER_MIME.to_string(),
        parents: vec![parent.to_string()],
        web_view_link: None,
    }
}

fn ids(entries: &[DriveEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

#[tokio::test]
async fn test_walk_is_pre_order() {
    let mut source = MockDirectorySource::new();
    source.add_folder(
        "root",
        vec![vec![file("A", "a.pdf", "root"), folder("B", "B", "root")]],
    );
    source.add_folder("B", vec![vec![file("C", "c.pdf", "B")]]);

    let fetcher = TreeFetcher::new(Arc::new(source));
    let inventory = fetcher.fetch_tree("root").await.unwrap();
    assert_eq!(ids(inventory.entries()), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_walk_follows_continuation_tokens() {
    let mut source = MockDirectorySource::new();
    source.add_folder(
        "root",
        vec![vec![file("A", "a.pdf", "root")], vec![file("B", "b.pdf", "root")]],
    );
    let source = Arc::new(source);

    let fetcher = TreeFetcher::new(source.clone());
    let inventory = fetcher.fetch_tree("root").await.unwrap();
    assert_eq!(ids(inventory.entries()), vec!["A", "B"]);
    assert_eq!(source.listings.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disk_cache_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let cache = JsonFileCache::new(temp_dir.path().join("drive_cache.json"));

    let mut inventory: drive_inventory::Inventory = vec![
        folder("F", "Kevad 2024", "root"),
        file("1", "Tööplaan 01.02.2024.pdf", "F"),
    ]
    .into_iter()
    .collect();
    let mut multi_parent = file("2", "shared.pdf", "F");
    multi_parent.parents.push("other".to_string());
    multi_parent.web_view_link = None;
    inventory.push(multi_parent);

    cache.save(&inventory).await.unwrap();

    // A fresh handle on the same file sees the same snapshot
    let reopened = JsonFileCache::new(temp_dir.path().join("drive_cache.json"));
    assert_eq!(reopened.load().await.unwrap().unwrap(), inventory);
}

#[tokio::test]
async fn test_reads_snapshot_in_drive_record_shape() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("drive_cache.json");
    std::fs::write(
        &path,
        r#"[
  {
    "id": "1",
    "name": "Report 01.02.2024.pdf",
    "mimeType": "application/pdf",
    "parents": ["root"],
    "webViewLink": "https://drive.google.com/file/d/1/view"
  }
]"#,
    )
    .unwrap();

    let inventory = JsonFileCache::new(&path).load().await.unwrap().unwrap();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory.entries()[0].kind(), EntryKind::File);
}

#[tokio::test]
async fn test_malformed_cache_is_corrupt_not_absent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("drive_cache.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let cache = JsonFileCache::new(&path);
    assert!(cache.exists().await);
    assert!(matches!(
        cache.load().await,
        Err(DriveError::CorruptCache { .. })
    ));
}

#[tokio::test]
async fn test_failed_walk_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let cache_path = temp_dir.path().join("drive_cache.json");

    let mut source = MockDirectorySource::new();
    source.add_root("Root", "root");
    source.add_folder(
        "root",
        vec![vec![file("A", "a.pdf", "root"), folder("B", "B", "root")]],
    );
    source.fail_listing("B");

    let cache = Arc::new(JsonFileCache::new(&cache_path));
    let resolver = InventoryResolver::new(Arc::new(source), cache.clone());

    assert!(matches!(
        resolver.load_or_fetch("Root").await,
        Err(DriveError::RemoteUnavailable { .. })
    ));
    assert!(!cache.exists().await);
}

#[tokio::test]
async fn test_present_cache_is_trusted() {
    let temp_dir = TempDir::new().unwrap();
    let cache = Arc::new(JsonFileCache::new(temp_dir.path().join("drive_cache.json")));
    let stale: drive_inventory::Inventory =
        vec![file("old", "old.pdf", "root")].into_iter().collect();
    cache.save(&stale).await.unwrap();

    let mut source = MockDirectorySource::new();
    source.add_root("Root", "root");
    source.add_folder("root", vec![vec![file("new", "new.pdf", "root")]]);
    let source = Arc::new(source);

    let resolver = InventoryResolver::new(source.clone(), cache);
    let loaded = resolver.load_or_fetch("Root").await.unwrap();

    assert_eq!(loaded.origin, InventoryOrigin::Cache);
    assert_eq!(loaded.inventory, stale);
    assert_eq!(source.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_root_is_fatal_even_with_cache() {
    let cache = Arc::new(MemoryCache::new());
    cache
        .save(&vec![file("1", "a.pdf", "root")].into_iter().collect())
        .await
        .unwrap();

    let resolver = InventoryResolver::new(Arc::new(MockDirectorySource::new()), cache);
    assert!(matches!(
        resolver.load_or_fetch("Root").await,
        Err(DriveError::RootNotFound { .. })
    ));
}

#[tokio::test]
async fn test_search_and_download_session() {
    let temp_dir = TempDir::new().unwrap();

    let mut doc = file("doc", "Protokoll 01.02.2024", "sub");
    doc.mime_type = "application/vnd.google-apps.document".to_string();

    let mut source = MockDirectorySource::new();
    source.add_root("Root", "root");
    source.add_folder(
        "root",
        vec![vec![
            file("1", "Report 01.02.2024.pdf", "root"),
            file("2", "Report 02.02.2024.pdf", "root"),
            folder("sub", "Protocols", "root"),
        ]],
    );
    source.add_folder("sub", vec![vec![doc]]);
    source.add_content("doc", b"%PDF exported");

    let resolver = InventoryResolver::new(
        Arc::new(source),
        Arc::new(JsonFileCache::new(temp_dir.path().join("drive_cache.json"))),
    );

    let loaded = resolver.load_or_fetch("Root").await.unwrap();
    assert_eq!(loaded.origin, InventoryOrigin::Remote);
    assert_eq!(ids(loaded.inventory.entries()), vec!["1", "2", "sub", "doc"]);

    let results = search(
        &loaded.inventory,
        &SearchQuery::new("").with_date_token("01.02.2024"),
    );
    assert_eq!(ids(results.entries()), vec!["1", "doc"]);

    let results = search(
        &loaded.inventory,
        &SearchQuery::new("protokoll").with_date_token("01.02.2024"),
    );
    let entry = &results.entries()[0];
    let content = resolver.download(entry).await.unwrap();
    assert_eq!(content.content, bytes::Bytes::from("%PDF exported"));
    assert_eq!(content.mime_type.as_deref(), Some("application/pdf"));

    let out = temp_dir.path().join("downloads");
    let saved = drive_inventory::download::save_download(&out, entry, &content)
        .await
        .unwrap();
    assert_eq!(saved, out.join("Protokoll 01.02.2024.pdf"));

    // One failed download leaves the others unaffected
    let missing = &loaded.inventory.entries()[1];
    assert!(matches!(
        resolver.download(missing).await,
        Err(DriveError::DownloadFailed { .. })
    ));
    assert!(resolver.download(entry).await.is_ok());
}

#[tokio::test]
async fn test_empty_name_query_returns_inventory() {
    let inventory: drive_inventory::Inventory = vec![
        file("1", "b.pdf", "root"),
        folder("2", "A", "root"),
        file("3", "c.pdf", "2"),
    ]
    .into_iter()
    .collect();

    let query = SearchQuery {
        name: String::new(),
        date_token: Some("01.01.2000".to_string()),
        date_filter: false,
    };
    assert_eq!(search(&inventory, &query), inventory);
}
