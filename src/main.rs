//! spaccess - command line access to SharePoint document libraries.
//!
//! Credentials come from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID` and
//! `AZURE_CLIENT_SECRET` (a `.env` file is honoured).

#![deny(clippy::all)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sharepoint_access::graph::endpoints;
use sharepoint_access::{Config, SharePointClient, WaitOptions};

#[derive(Parser)]
#[command(name = "spaccess", version, about = "SharePoint access over Microsoft Graph")]
struct Cli {
    /// Configuration file (defaults to the user config dir, then built-in defaults)
    #[arg(long, global = true, env = "SPACCESS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// A document library addressed by name.
#[derive(Args)]
struct Location {
    /// SharePoint host, e.g. contoso.sharepoint.com
    #[arg(long)]
    domain: String,
    /// Server-relative site path, e.g. /sites/Finance
    #[arg(long)]
    site: String,
    /// Document library name
    #[arg(long, default_value = "Documents")]
    drive: String,
}

/// A drive addressed by ids.
#[derive(Args)]
struct DriveIds {
    #[arg(long)]
    site_id: String,
    #[arg(long)]
    drive_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a site id
    SiteId {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        site: String,
    },
    /// List the document libraries of a site
    Drives {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        site: String,
    },
    /// List folders and files in a directory
    Ls {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value = "")]
        path: String,
    },
    /// Show the newest file in a directory
    LatestFile {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value = "")]
        path: String,
        /// Also download it to the configured download directory
        #[arg(long)]
        download: bool,
    },
    /// Show the newest folder in a directory
    LatestFolder {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value = "")]
        path: String,
    },
    /// Download a file to a local directory
    Download {
        #[command(flatten)]
        drive: DriveIds,
        #[arg(long, default_value = "")]
        folder: String,
        #[arg(long)]
        name: String,
        /// Target directory (defaults to the configured download directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Upload a local file
    Upload {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value = "")]
        path: String,
        #[arg(long)]
        file: PathBuf,
        /// Name in SharePoint (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
    /// Delete a file by name
    Delete {
        #[command(flatten)]
        location: Location,
        #[arg(long, default_value = "")]
        path: String,
        #[arg(long)]
        name: String,
    },
    /// Wait for a file to appear
    Wait {
        #[command(flatten)]
        drive: DriveIds,
        #[arg(long, default_value = "")]
        folder: String,
        #[arg(long)]
        name: String,
        /// Seconds to wait (defaults to configuration)
        #[arg(long)]
        timeout: Option<u64>,
        /// Seconds between probes (defaults to configuration)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Refresh all pivot tables on a worksheet
    RefreshPivots {
        #[command(flatten)]
        drive: DriveIds,
        #[arg(long)]
        item_id: String,
        #[arg(long)]
        sheet: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            eprintln!("\nPlease set the following environment variables:");
            eprintln!("  AZURE_TENANT_ID=<your-tenant-id>");
            eprintln!("  AZURE_CLIENT_ID=<your-azure-ad-client-id>");
            eprintln!("  AZURE_CLIENT_SECRET=<your-client-secret>");
            std::process::exit(2);
        }
    };

    init_logging(&config);
    info!("Starting spaccess v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command, &config).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Initialize tracing/logging.
fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    let client = SharePointClient::connect(config)
        .await
        .context("Failed to authenticate")?;

    match command {
        Commands::SiteId { domain, site } => {
            let site_id = client.get_site_id(&domain, &site).await?;
            print_json(&serde_json::json!({ "id": site_id }))
        }
        Commands::Drives { domain, site } => {
            let site_id = client.get_site_id(&domain, &site).await?;
            let drives = client.get_drive_ids(&site_id).await?;
            print_json(&drives)
        }
        Commands::Ls { location, path } => {
            let listing = client
                .get_directory_list(&location.domain, &location.site, &location.drive, &path)
                .await?;
            print_json(&listing)
        }
        Commands::LatestFile {
            location,
            path,
            download,
        } => {
            let file = client
                .get_most_recent_file(
                    &location.domain,
                    &location.site,
                    &location.drive,
                    &path,
                    download,
                )
                .await?;
            print_json(&file)
        }
        Commands::LatestFolder { location, path } => {
            let folder = client
                .get_most_recent_folder(&location.domain, &location.site, &location.drive, &path)
                .await?;
            print_json(&folder)
        }
        Commands::Download {
            drive,
            folder,
            name,
            out,
        } => {
            let item = client
                .get_item(&drive.site_id, &drive.drive_id, &folder, &name)
                .await?;
            let url = endpoints::item_content(
                client.session().base_url(),
                &drive.site_id,
                &drive.drive_id,
                &item.id,
            );
            let dir = out.unwrap_or_else(|| config.download.default_dir.clone());
            let saved = client.download_file_to(&name, &url, &dir).await?;
            print_json(&serde_json::json!({ "path": saved }))
        }
        Commands::Upload {
            location,
            path,
            file,
            name,
            content_type,
        } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Cannot derive a file name from --file")?,
            };
            let item = client
                .save_file_in_sharepoint(
                    &location.domain,
                    &location.site,
                    &path,
                    &location.drive,
                    &file,
                    &name,
                    &content_type,
                )
                .await?;
            print_json(&item.summary())
        }
        Commands::Delete {
            location,
            path,
            name,
        } => {
            let listing = client
                .get_directory_list(&location.domain, &location.site, &location.drive, &path)
                .await?;
            let file = listing
                .files
                .iter()
                .find(|f| f.name == name)
                .with_context(|| format!("File '{}' not found in '{}'", name, path))?;
            client
                .delete_file(file, &location.domain, &location.site, &location.drive)
                .await?;
            print_json(&serde_json::json!({ "deleted": file.id }))
        }
        Commands::Wait {
            drive,
            folder,
            name,
            timeout,
            interval,
        } => {
            let defaults = client.options().wait;
            let options = WaitOptions {
                timeout: timeout.map(Duration::from_secs).unwrap_or(defaults.timeout),
                poll_interval: interval
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.poll_interval),
            };
            let item = client
                .wait_for_file(&drive.site_id, &drive.drive_id, &folder, &name, options)
                .await?;
            print_json(&item)
        }
        Commands::RefreshPivots {
            drive,
            item_id,
            sheet,
        } => {
            client
                .refresh_pivot_table(&drive.site_id, &drive.drive_id, &item_id, &sheet)
                .await?;
            let tables = client
                .list_pivot_tables(&drive.site_id, &drive.drive_id, &item_id, &sheet)
                .await?;
            print_json(&tables)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
