pub mod auth;
pub mod cache;
pub mod config;
pub mod download;
pub mod drive;
pub mod error;
pub mod fetcher;
pub mod query;
pub mod resolver;
pub mod source;
pub mod types;

pub use auth::{Authenticator, StaticToken, TokenSource};
pub use cache::{InventoryCache, JsonFileCache, MemoryCache};
pub use config::Config;
pub use drive::GoogleDriveSource;
pub use error::{DriveError, Result};
pub use fetcher::TreeFetcher;
pub use query::{search, SearchQuery};
pub use resolver::{InventoryOrigin, InventoryResolver, LoadedInventory};
pub use source::DirectorySource;
pub use types::{ChildPage, DriveEntry, EntryKind, FileContent, Inventory, NativeKind};
