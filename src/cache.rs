use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::types::Inventory;

/// Single-generation store for one inventory snapshot
///
/// `load` returns everything or nothing; `save` replaces the whole snapshot.
#[async_trait]
pub trait InventoryCache: Send + Sync {
    /// Load the stored snapshot, `None` if there is none
    async fn load(&self) -> Result<Option<Inventory>>;

    /// Replace the stored snapshot
    async fn save(&self, inventory: &Inventory) -> Result<()>;

    /// Check if a snapshot is stored
    async fn exists(&self) -> bool;

    /// Remove the stored snapshot
    async fn clear(&self) -> Result<()>;
}

/// In-memory snapshot holder
pub struct MemoryCache {
    store: Arc<RwLock<Option<Inventory>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryCache for MemoryCache {
    async fn load(&self) -> Result<Option<Inventory>> {
        let store = self.store.read().await;
        Ok(store.clone())
    }

    async fn save(&self, inventory: &Inventory) -> Result<()> {
        let mut store = self.store.write().await;
        *store = Some(inventory.clone());
        Ok(())
    }

    async fn exists(&self) -> bool {
        let store = self.store.read().await;
        store.is_some()
    }

    async fn clear(&self) -> Result<()> {
        let mut store = self.store.write().await;
        *store = None;
        Ok(())
    }
}

/// Snapshot persisted as a pretty-printed JSON array in a single file
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path the snapshot is written to before the rename
    ///
    /// Unique per call, so concurrent writers never share a staging file.
    fn staging_path(&self) -> PathBuf {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let mut name = std::ffi::OsString::from(".");
        name.push(self.path.file_name().unwrap_or_default());
        name.push(format!(".{}.{}.tmp", std::process::id(), suffix));
        self.path.with_file_name(name)
    }

    fn corrupt_error(&self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> DriveError {
        DriveError::CorruptCache {
            path: self.path.clone(),
            source: source.into(),
        }
    }

    fn persist_error(&self, source: std::io::Error) -> DriveError {
        DriveError::PersistUnavailable {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl InventoryCache for JsonFileCache {
    async fn load(&self) -> Result<Option<Inventory>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt_error(e)),
        };

        let inventory: Inventory =
            serde_json::from_slice(&data).map_err(|e| self.corrupt_error(e))?;

        debug!(path = %self.path.display(), entries = inventory.len(), "loaded cache snapshot");
        Ok(Some(inventory))
    }

    async fn save(&self, inventory: &Inventory) -> Result<()> {
        let data = serde_json::to_vec_pretty(inventory)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.persist_error(e))?;
        }

        let staging = self.staging_path();
        if let Err(e) = fs::write(&staging, &data).await {
            let _ = fs::remove_file(&staging).await;
            return Err(self.persist_error(e));
        }

        if let Err(e) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(self.persist_error(e));
        }

        debug!(path = %self.path.display(), entries = inventory.len(), "saved cache snapshot");
        Ok(())
    }

    async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.persist_error(e)),
        }
    }
}
