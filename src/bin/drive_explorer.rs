//! drive-explorer: search and download files under one Google Drive folder
//!
//! Usage:
//!   drive-explorer auth                                  Authorize and store a token
//!   drive-explorer search [--name S] [--date D]          Search the cached inventory
//!   drive-explorer download <ID>... [--out DIR]          Download entries by id

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use drive_inventory::{
    config::DEFAULT_CONFIG_PATH, download::save_download, Authenticator, Config, DriveError,
    GoogleDriveSource, InventoryOrigin, InventoryResolver, JsonFileCache, LoadedInventory,
    SearchQuery,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(
    name = "drive-explorer",
    about = "Search and download files under one Google Drive folder",
    version
)]
struct Cli {
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Root folder name (overrides the config file)
    #[arg(long)]
    root: Option<String>,

    /// Inventory cache file (overrides the config file)
    #[arg(long)]
    cache: Option<PathBuf>,

    #[arg(short, long, default_value = "INFO")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the browser consent flow and store the token
    Auth,
    /// Search the inventory by name and date
    Search {
        /// Text the file name must contain (case-insensitive)
        #[arg(short, long, default_value = "")]
        name: String,
        /// Date the file name must contain (default: today)
        #[arg(short, long, conflicts_with = "no_date_filter")]
        date: Option<String>,
        /// Do not filter by date
        #[arg(long)]
        no_date_filter: bool,
    },
    /// Download entries of the inventory by id
    Download {
        /// Entry ids
        #[arg(required = true)]
        ids: Vec<String>,
        /// Output directory (default: from config)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool, DriveError> {
    let mut config = Config::read(&cli.config)?;
    if let Some(root) = cli.root {
        config.root_folder_name = root;
    }
    if let Some(cache) = cli.cache {
        config.cache_path = cache;
    }
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Auth => {
            let auth = Authenticator::new(&config.credentials_path, &config.token_path);
            auth.authorize().await?;
            println!(
                "Authentication successful. '{}' created.",
                config.token_path.display()
            );
            Ok(true)
        }
        Commands::Search {
            name,
            date,
            no_date_filter,
        } => {
            let resolver = open_session(&config).await?;
            let loaded = load_inventory(&resolver, &config).await?;

            let mut query = SearchQuery::new(name);
            if !no_date_filter {
                let date = match date {
                    Some(text) => parse_date(&text, &config.date_format)?,
                    None => Local::now().date_naive(),
                };
                query = query.with_date(date, &config.date_format);
            }

            let results = drive_inventory::search(&loaded.inventory, &query);
            println!("Found {} files", results.len());
            for entry in results.iter() {
                println!();
                println!("  {}", entry.name);
                println!("    id:   {}", entry.id);
                if let Some(link) = &entry.web_view_link {
                    println!("    open: {}", link);
                }
            }
            Ok(true)
        }
        Commands::Download { ids, out } => {
            let resolver = open_session(&config).await?;
            let loaded = load_inventory(&resolver, &config).await?;
            let out = out.unwrap_or_else(|| config.download_dir.clone());

            let mut all_ok = true;
            for id in &ids {
                let Some(entry) = loaded.inventory.find(id) else {
                    eprintln!("'{}' is not in the inventory", id);
                    all_ok = false;
                    continue;
                };

                let saved = match resolver.download(entry).await {
                    Ok(file) => save_download(&out, entry, &file).await,
                    Err(e) => Err(e),
                };
                match saved {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(e) => {
                        warn!(id = %id, "download failed: {}", e);
                        eprintln!("{}", e);
                        all_ok = false;
                    }
                }
            }
            Ok(all_ok)
        }
    }
}

fn parse_date(text: &str, format: &str) -> Result<NaiveDate, DriveError> {
    NaiveDate::parse_from_str(text, format).map_err(|e| DriveError::InvalidConfig {
        message: format!("date '{}' does not match '{}': {}", text, format, e),
    })
}

/// Build the authenticated Drive client and the cache for this session
async fn open_session(config: &Config) -> Result<InventoryResolver, DriveError> {
    let auth = Arc::new(Authenticator::new(
        &config.credentials_path,
        &config.token_path,
    ));
    auth.initialize(true).await?;

    let source = GoogleDriveSource::new(auth).with_page_size(config.page_size);
    let cache = JsonFileCache::new(&config.cache_path);
    Ok(InventoryResolver::new(Arc::new(source), Arc::new(cache)))
}

async fn load_inventory(
    resolver: &InventoryResolver,
    config: &Config,
) -> Result<LoadedInventory, DriveError> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading inventory");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = |count: usize| spinner.set_message(format!("Fetched {} entries", count));
    let loaded = resolver
        .load_or_fetch_with_progress(&config.root_folder_name, Some(&report))
        .await;
    spinner.finish_and_clear();

    let loaded = loaded?;
    match loaded.origin {
        InventoryOrigin::Cache => {
            println!("Loaded {} files from cache.", loaded.inventory.len())
        }
        InventoryOrigin::Remote => println!(
            "Fetched {} files and saved cache.",
            loaded.inventory.len()
        ),
    }
    Ok(loaded)
}
