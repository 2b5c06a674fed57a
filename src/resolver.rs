use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    cache::InventoryCache,
    error::{DriveError, Result},
    fetcher::{ProgressFn, TreeFetcher},
    source::DirectorySource,
    types::{DriveEntry, EntryKind, FileContent, Inventory},
};

/// Where a loaded inventory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryOrigin {
    Cache,
    Remote,
}

/// Inventory of one root folder together with how it was obtained
#[derive(Debug, Clone)]
pub struct LoadedInventory {
    pub root_id: String,
    pub inventory: Inventory,
    pub origin: InventoryOrigin,
}

/// Serves the inventory of the root folder, from the cache when present
///
/// A stored snapshot is trusted as-is; the remote tree is only walked when
/// no snapshot exists, and the result then replaces the snapshot.
pub struct InventoryResolver {
    source: Arc<dyn DirectorySource>,
    cache: Arc<dyn InventoryCache>,
}

impl InventoryResolver {
    pub fn new(source: Arc<dyn DirectorySource>, cache: Arc<dyn InventoryCache>) -> Self {
        Self { source, cache }
    }

    /// Look up the root folder id by exact name
    ///
    /// Returns `RootNotFound` if no folder carries that name
    pub async fn resolve_root(&self, root_name: &str) -> Result<String> {
        self.source
            .find_folder(root_name)
            .await?
            .ok_or_else(|| DriveError::RootNotFound {
                name: root_name.to_string(),
            })
    }

    /// Load the inventory under `root_name`
    pub async fn load_or_fetch(&self, root_name: &str) -> Result<LoadedInventory> {
        self.load_or_fetch_with_progress(root_name, None).await
    }

    /// Load the inventory under `root_name`, reporting walk progress
    ///
    /// The root is resolved first, so a missing root is reported even when a
    /// snapshot exists. An empty snapshot counts as no snapshot. If the walk
    /// fails nothing is written.
    pub async fn load_or_fetch_with_progress(
        &self,
        root_name: &str,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<LoadedInventory> {
        let root_id = self.resolve_root(root_name).await?;

        if let Some(inventory) = self.cache.load().await? {
            if !inventory.is_empty() {
                info!(entries = inventory.len(), "loaded inventory from cache");
                return Ok(LoadedInventory {
                    root_id,
                    inventory,
                    origin: InventoryOrigin::Cache,
                });
            }
            warn!("cached inventory is empty, fetching again");
        }

        info!(root = root_name, "no cached inventory, walking remote tree");
        let inventory = TreeFetcher::new(self.source.clone())
            .fetch_tree_with_progress(&root_id, progress)
            .await?;
        self.cache.save(&inventory).await?;
        info!(entries = inventory.len(), "fetched inventory and saved cache");

        Ok(LoadedInventory {
            root_id,
            inventory,
            origin: InventoryOrigin::Remote,
        })
    }

    /// Fetch the content of one entry
    ///
    /// Folders have no content and fail without a remote call.
    pub async fn download(&self, entry: &DriveEntry) -> Result<FileContent> {
        match entry.kind() {
            EntryKind::Folder => Err(DriveError::DownloadFailed {
                id: entry.id.clone(),
                message: format!("'{}' is a folder", entry.name),
            }),
            kind => self.source.download(&entry.id, kind).await,
        }
    }

    /// Get the directory source
    pub fn source(&self) -> &Arc<dyn DirectorySource> {
        &self.source
    }

    /// Get the inventory cache
    pub fn cache(&self) -> &Arc<dyn InventoryCache> {
        &self.cache
    }
}
