//! File uploads: single PUT for small payloads, upload sessions for large ones.

use std::path::Path;

use reqwest::header::CONTENT_RANGE;
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, info, warn};

use super::client::SharePointClient;
use crate::error::{ApiError, Result, SharePointError};
use crate::graph::endpoints;
use crate::graph::models::{DriveItem, UploadSession};
use crate::graph::GraphRequest;

const OCTET_STREAM: &str = "application/octet-stream";

impl SharePointClient {
    /// Upload `data` as `folder/name`, replacing any existing file.
    pub async fn upload_new_file(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
        data: Vec<u8>,
    ) -> Result<DriveItem> {
        self.upload_bytes(site_id, drive_id, folder, name, data, OCTET_STREAM)
            .await
    }

    /// Upload a local file into a drive given by name.
    #[allow(clippy::too_many_arguments)]
    pub async fn save_file_in_sharepoint(
        &self,
        domain: &str,
        site_name: &str,
        path: &str,
        drive_name: &str,
        local_path: &Path,
        file_name: &str,
        content_type: &str,
    ) -> Result<DriveItem> {
        let drive = self.resolve_drive(domain, site_name, drive_name).await?;
        let data = tokio::fs::read(local_path).await?;

        self.upload_bytes(
            &drive.site_id,
            &drive.drive_id,
            path,
            file_name,
            data,
            content_type,
        )
        .await
    }

    /// Upload with an explicit content type, picking simple or session upload by size.
    pub async fn upload_bytes(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<DriveItem> {
        info!("Uploading file '{}' ({} bytes)...", name, data.len());

        let item = if data.len() <= self.options.simple_upload_limit {
            let url = endpoints::content_by_path(
                self.session.base_url(),
                site_id,
                drive_id,
                folder,
                name,
            );
            self.session
                .send_json(GraphRequest::put(url).bytes(data, content_type))
                .await?
        } else {
            self.upload_in_session(site_id, drive_id, folder, name, data, content_type)
                .await?
        };

        info!("File '{}' uploaded", name);
        Ok(item)
    }

    async fn upload_in_session(
        &self,
        site_id: &str,
        drive_id: &str,
        folder: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<DriveItem> {
        let url = endpoints::upload_session(self.session.base_url(), site_id, drive_id, folder, name);
        let body = json!({ "item": { "@microsoft.graph.conflictBehavior": "replace" } });
        let session: UploadSession = self
            .session
            .send_json(GraphRequest::post(url).json(body))
            .await?;

        match self.send_chunks(&session.upload_url, &data, content_type).await {
            Ok(item) => Ok(item),
            Err(e) => {
                warn!("Upload of '{}' failed, cancelling session: {}", name, e);
                let cancel = GraphRequest::delete(session.upload_url.clone())
                    .unauthenticated()
                    .without_retry();
                if let Err(cancel_err) = self.session.send_empty(cancel).await {
                    debug!("Cancelling upload session failed: {}", cancel_err);
                }
                Err(e)
            }
        }
    }

    async fn send_chunks(
        &self,
        upload_url: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<DriveItem> {
        let total = data.len();

        for (start, end) in chunk_bounds(total, self.options.chunk_size) {
            let request = GraphRequest::put(upload_url)
                .unauthenticated()
                .header(CONTENT_RANGE, content_range(start, end, total))
                .bytes(data[start..end].to_vec(), content_type);

            let response = self.session.execute(request).await?;
            debug!("Uploaded bytes {}-{} of {}", start, end - 1, total);

            if matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
                return response
                    .json::<DriveItem>()
                    .await
                    .map_err(|e| ApiError::ParseFailed(e.to_string()).into());
            }
        }

        Err(SharePointError::Api(ApiError::RequestFailed(
            "upload session ended without returning the item".into(),
        )))
    }
}

/// Half-open byte ranges covering `total` in `chunk`-sized pieces.
pub(crate) fn chunk_bounds(total: usize, chunk: usize) -> Vec<(usize, usize)> {
    let chunk = chunk.max(1);
    (0..total)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(total)))
        .collect()
}

/// `Content-Range` value for the half-open range `start..end`.
pub(crate) fn content_range(start: usize, end: usize, total: usize) -> String {
    format!("bytes {}-{}/{}", start, end - 1, total)
}
