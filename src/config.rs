use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::drive::DEFAULT_PAGE_SIZE;
use crate::error::{DriveError, Result};
use crate::query::DEFAULT_DATE_FORMAT;

pub const DEFAULT_CONFIG_PATH: &str = "drive-explorer.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the folder whose tree is listed
    pub root_folder_name: String,

    /// Where the inventory snapshot is stored
    pub cache_path: PathBuf,

    /// OAuth client secret descriptor
    pub credentials_path: PathBuf,

    /// Refreshable token artifact
    pub token_path: PathBuf,

    /// Children requested per listing call
    pub page_size: u32,

    /// `strftime` pattern dates appear in within file names
    pub date_format: String,

    /// Where downloaded files are written
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_folder_name: "PAPSID 1-5 hooajad".to_string(),
            cache_path: PathBuf::from("drive_cache.json"),
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            page_size: DEFAULT_PAGE_SIZE,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            download_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Read the config file; a missing file yields the defaults
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = match std::fs::read_to_string(path) {
            Ok(config) => config,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(DriveError::InvalidConfig {
                    message: format!("cannot read {}: {}", path.display(), e),
                })
            }
        };

        let config: Self = serde_json::from_str(&config).map_err(|e| DriveError::InvalidConfig {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.root_folder_name.is_empty() {
            return Err(DriveError::InvalidConfig {
                message: "root_folder_name must not be empty".to_string(),
            });
        }
        if !(1..=1000).contains(&self.page_size) {
            return Err(DriveError::InvalidConfig {
                message: format!("page_size must be between 1 and 1000, got {}", self.page_size),
            });
        }
        Ok(())
    }
}
