//! SharePoint document library and Excel workbook operations.
//!
//! This module provides functionality for:
//! - Resolving sites and document libraries by name
//! - Listing, downloading, uploading and deleting drive items
//! - Waiting for files or folders produced by other systems
//! - Editing ranges and refreshing pivot tables in Excel workbooks

use std::time::Duration;

use serde::Serialize;

pub mod cache;
pub mod client;
pub mod poll;
pub mod upload;
pub mod workbook;

pub use cache::LocationCache;
pub use client::{ClientOptions, SharePointClient};
pub use workbook::{column_letters, ClearApplyTo};

/// Resolved ids of a document library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveRef {
    pub site_id: String,
    pub drive_id: String,
}

/// Polling parameters for [`SharePointClient::wait_for_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(3),
        }
    }
}
