//! Polling for files and folders that another system is about to produce.

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::client::SharePointClient;
use super::WaitOptions;
use crate::error::{ApiError, Result, SharePointError};
use crate::graph::endpoints;
use crate::graph::models::{DriveItem, ItemKind, ItemSummary};
use crate::graph::GraphRequest;

impl SharePointClient {
    /// Wait until `folder/name` exists as a file.
    pub async fn wait_for_file(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
        options: WaitOptions,
    ) -> Result<ItemSummary> {
        self.wait_for_item(site_id, drive_id, folder, name, ItemKind::File, options)
            .await
    }

    /// Wait until `parent/name` exists as a folder.
    pub async fn wait_for_folder(
        &self,
        site_id: &str,
        drive_id: &str,
        parent: &str,
        name: &str,
        options: WaitOptions,
    ) -> Result<ItemSummary> {
        self.wait_for_item(site_id, drive_id, parent, name, ItemKind::Folder, options)
            .await
    }

    /// Probe every `poll_interval` until the item appears or `timeout` elapses.
    ///
    /// Missing items and transient failures keep the loop going; rejected
    /// credentials or permissions end it immediately. A final probe runs at
    /// the deadline.
    async fn wait_for_item(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
        kind: ItemKind,
        options: WaitOptions,
    ) -> Result<ItemSummary> {
        let url = endpoints::item_by_path(self.session.base_url(), site_id, drive_id, folder, name);
        let started = Instant::now();
        info!("Waiting for '{}' in '{}'...", name, folder);

        loop {
            match self.probe(&url).await {
                Ok(item) if item.kind() == kind => {
                    info!("'{}' is now available", name);
                    return Ok(item.summary());
                }
                Ok(item) => debug!("'{}' exists but is a {:?}", name, item.kind()),
                Err(e) if is_fatal_while_waiting(&e) => return Err(e),
                Err(SharePointError::Api(ApiError::NotFound(_))) => {
                    debug!("'{}' not available yet", name)
                }
                Err(e) => warn!("'{}' not available yet: {}", name, e),
            }

            let remaining = options.timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Err(SharePointError::WaitTimeout {
                    name: name.to_string(),
                    folder: folder.to_string(),
                    waited: started.elapsed(),
                });
            }
            sleep(options.poll_interval.min(remaining)).await;
        }
    }

    async fn probe(&self, url: &str) -> Result<DriveItem> {
        self.session
            .send_json(GraphRequest::get(url).without_retry())
            .await
    }
}

fn is_fatal_while_waiting(err: &SharePointError) -> bool {
    matches!(
        err,
        SharePointError::Auth(_)
            | SharePointError::Api(ApiError::Unauthorized)
            | SharePointError::Api(ApiError::Forbidden)
    )
}
