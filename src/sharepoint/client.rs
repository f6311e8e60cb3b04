//! SharePoint client for sites, drives and drive items.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::cache::LocationCache;
use super::{DriveRef, WaitOptions};
use crate::auth::{ClientCredentials, SecureString};
use crate::config::Config;
use crate::error::{ApiError, Result, SharePointError};
use crate::graph::endpoints;
use crate::graph::models::{DirectoryListing, Drive, DriveItem, ItemSummary, Site};
use crate::graph::{GraphRequest, GraphSession};

/// Tunables that sit on top of the Graph session.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Target directory for downloads that do not name one (a DBFS mount by default).
    pub download_dir: PathBuf,
    /// Payloads up to this size use a single PUT; larger ones an upload session.
    pub simple_upload_limit: usize,
    /// Chunk size for upload sessions; a multiple of 320 KiB.
    pub chunk_size: usize,
    pub wait: WaitOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("/dbfs/"),
            simple_upload_limit: 4 * 1024 * 1024,
            chunk_size: 10 * crate::config::UPLOAD_CHUNK_ALIGNMENT,
            wait: WaitOptions::default(),
        }
    }
}

impl ClientOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            download_dir: config.download.default_dir.clone(),
            simple_upload_limit: config.upload.simple_upload_limit_bytes,
            chunk_size: config.upload.chunk_size_bytes,
            wait: config.polling.wait_options(),
        }
    }
}

/// SharePoint client over Microsoft Graph.
pub struct SharePointClient {
    pub(crate) session: GraphSession,
    pub(crate) options: ClientOptions,
    locations: Mutex<LocationCache>,
}

impl SharePointClient {
    pub fn new(session: GraphSession, options: ClientOptions) -> Self {
        Self {
            session,
            options,
            locations: Mutex::new(LocationCache::new()),
        }
    }

    /// Build a client from configuration without contacting Azure AD.
    pub fn from_config(config: &Config) -> Result<Self> {
        let session = GraphSession::from_config(config)?;
        Ok(Self::new(session, ClientOptions::from_config(config)))
    }

    /// Build a client and acquire the first token, so bad credentials fail here.
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = Self::from_config(config)?;
        client.session.tokens().access_token().await?;
        Ok(client)
    }

    pub fn session(&self) -> &GraphSession {
        &self.session
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    // --- Credentials ---

    /// Replace all app credentials. The next request authenticates with them.
    pub async fn set_credentials(&self, credentials: ClientCredentials) {
        self.session.tokens().replace_credentials(credentials).await;
        self.locations.lock().await.invalidate();
    }

    pub async fn set_client_id(&self, client_id: impl Into<String>) {
        let client_id = client_id.into();
        self.session
            .tokens()
            .update_credentials(|c| c.client_id = client_id)
            .await;
    }

    /// Changing tenant also drops cached site/drive ids.
    pub async fn set_tenant_id(&self, tenant_id: impl Into<String>) {
        let tenant_id = tenant_id.into();
        self.session
            .tokens()
            .update_credentials(|c| c.tenant_id = tenant_id)
            .await;
        self.locations.lock().await.invalidate();
    }

    pub async fn set_client_secret(&self, client_secret: impl Into<SecureString>) {
        let client_secret = client_secret.into();
        self.session
            .tokens()
            .update_credentials(|c| c.client_secret = client_secret)
            .await;
    }

    // --- Sites and drives ---

    /// Resolve a site id from its host name and server-relative path.
    ///
    /// Graph returns `host,collection-id,web-id`; the host prefix is dropped.
    pub async fn get_site_id(&self, domain: &str, site_name: &str) -> Result<String> {
        let url = endpoints::site_by_path(self.session.base_url(), domain, site_name);
        let site: Site = self.session.get_json(&url).await?;

        if site.id.is_empty() {
            return Err(ApiError::ParseFailed("Site ID not found in response".into()).into());
        }

        debug!("Resolved site {}{} to {}", domain, site_name, site.short_id());
        Ok(site.short_id().to_string())
    }

    /// Map of document library name to drive id for a site.
    pub async fn get_drive_ids(&self, site_id: &str) -> Result<BTreeMap<String, String>> {
        let url = endpoints::site_drives(self.session.base_url(), site_id);
        let drives: Vec<Drive> = self.session.get_all_pages(&url).await?;

        Ok(drives.into_iter().map(|d| (d.name, d.id)).collect())
    }

    /// Resolve a document library by site and drive name, using the location cache.
    pub async fn resolve_drive(
        &self,
        domain: &str,
        site_name: &str,
        drive_name: &str,
    ) -> Result<DriveRef> {
        if let Some(cached) = self.locations.lock().await.get(domain, site_name, drive_name) {
            return Ok(cached.clone());
        }

        let site_id = self.get_site_id(domain, site_name).await?;
        let drives = self.get_drive_ids(&site_id).await?;
        let drive_id = drives
            .get(drive_name)
            .cloned()
            .ok_or_else(|| SharePointError::DriveNotFound(drive_name.to_string()))?;

        let location = DriveRef { site_id, drive_id };
        self.locations
            .lock()
            .await
            .insert(domain, site_name, drive_name, location.clone());
        Ok(location)
    }

    // --- Listing ---

    /// Folders and files directly under `path` in a drive given by ids.
    pub async fn list_directory(
        &self,
        site_id: &str,
        drive_id: &str,
        path: &str,
    ) -> Result<DirectoryListing> {
        let url = endpoints::children_by_path(self.session.base_url(), site_id, drive_id, path);
        let items: Vec<DriveItem> = self.session.get_all_pages(&url).await?;
        let listing = DirectoryListing::from_items(&items);

        debug!(
            "Listed '{}': {} folders, {} files",
            path,
            listing.folders.len(),
            listing.files.len()
        );
        Ok(listing)
    }

    /// Folders and files directly under `path` in a drive given by name.
    pub async fn get_directory_list(
        &self,
        domain: &str,
        site_name: &str,
        drive_name: &str,
        path: &str,
    ) -> Result<DirectoryListing> {
        let drive = self.resolve_drive(domain, site_name, drive_name).await?;
        self.list_directory(&drive.site_id, &drive.drive_id, path)
            .await
    }

    /// The newest file under `path`; optionally downloads it to the default directory.
    pub async fn get_most_recent_file(
        &self,
        domain: &str,
        site_name: &str,
        drive_name: &str,
        path: &str,
        download: bool,
    ) -> Result<ItemSummary> {
        let listing = self
            .get_directory_list(domain, site_name, drive_name, path)
            .await?;
        let most_recent = listing
            .most_recent_file()
            .cloned()
            .ok_or_else(|| SharePointError::EmptyDirectory {
                kind: "files",
                path: path.to_string(),
            })?;

        if download {
            let url = most_recent.download_url.as_deref().ok_or_else(|| {
                ApiError::ParseFailed(format!("no download URL for '{}'", most_recent.name))
            })?;
            self.download_file(&most_recent.name, url).await?;
        }

        Ok(most_recent)
    }

    /// The most recently created folder under `path`.
    pub async fn get_most_recent_folder(
        &self,
        domain: &str,
        site_name: &str,
        drive_name: &str,
        path: &str,
    ) -> Result<ItemSummary> {
        let listing = self
            .get_directory_list(domain, site_name, drive_name, path)
            .await?;
        listing
            .most_recent_folder()
            .cloned()
            .ok_or_else(|| SharePointError::EmptyDirectory {
                kind: "folders",
                path: path.to_string(),
            })
    }

    // --- Download ---

    /// Download to the configured default directory.
    pub async fn download_file(&self, file_name: &str, download_url: &str) -> Result<PathBuf> {
        let dir = self.options.download_dir.clone();
        self.download_file_to(file_name, download_url, &dir).await
    }

    /// Download `download_url` into `target_dir/file_name`, creating the directory.
    ///
    /// Pre-authenticated download URLs (outside the Graph base) are fetched
    /// without the bearer token.
    pub async fn download_file_to(
        &self,
        file_name: &str,
        download_url: &str,
        target_dir: &Path,
    ) -> Result<PathBuf> {
        let file_name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| SharePointError::InvalidInput(format!("bad file name '{file_name}'")))?;

        let mut request = GraphRequest::get(download_url);
        if !self.is_graph_url(download_url) {
            request = request.unauthenticated();
        }
        let response = self.session.execute(request).await?;
        let content = response.bytes().await.map_err(SharePointError::Network)?;

        tokio::fs::create_dir_all(target_dir).await?;
        let target = target_dir.join(file_name);
        tokio::fs::write(&target, &content).await?;

        info!(
            "File '{}' saved to {} ({} bytes)",
            file_name.to_string_lossy(),
            target_dir.display(),
            content.len()
        );
        Ok(target)
    }

    /// Metadata of an item addressed by folder and name.
    pub async fn get_item(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
    ) -> Result<DriveItem> {
        let url = endpoints::item_by_path(self.session.base_url(), site_id, drive_id, folder, name);
        self.session.get_json(&url).await
    }

    /// Content of a file addressed by folder and name.
    pub async fn download_file_content(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
    ) -> Result<Vec<u8>> {
        debug!("Retrieving metadata for file '{}'", name);
        let item = self.get_item(site_id, drive_id, folder, name).await?;

        let url = endpoints::item_content(self.session.base_url(), site_id, drive_id, &item.id);
        let content = self.session.get_bytes(&url).await?;

        info!("Downloaded '{}' ({} bytes)", name, content.len());
        Ok(content)
    }

    // --- Delete ---

    /// Delete a listed item from a drive given by name.
    pub async fn delete_file(
        &self,
        item: &ItemSummary,
        domain: &str,
        site_name: &str,
        drive_name: &str,
    ) -> Result<()> {
        let drive = self.resolve_drive(domain, site_name, drive_name).await?;
        self.delete_item(&drive.site_id, &drive.drive_id, &item.id)
            .await?;
        info!("Existing file '{}' deleted", item.name);
        Ok(())
    }

    /// Delete an item by id.
    pub async fn delete_item(&self, site_id: &str, drive_id: &str, item_id: &str) -> Result<()> {
        let url = endpoints::item(self.session.base_url(), site_id, drive_id, item_id);
        self.session.send_empty(GraphRequest::delete(url)).await?;
        Ok(())
    }

    fn is_graph_url(&self, url: &str) -> bool {
        url.starts_with(self.session.base_url()) || url.starts_with(self.session.beta_url())
    }
}
