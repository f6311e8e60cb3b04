//! SharePoint access over Microsoft Graph.
//!
//! Authenticates an Azure AD app registration with the client-credentials
//! grant, then lists, downloads, uploads and deletes drive items and edits
//! Excel workbooks stored in SharePoint document libraries.
//!
//! ```no_run
//! # async fn demo() -> sharepoint_access::Result<()> {
//! use sharepoint_access::{Config, SharePointClient};
//!
//! let config = Config::load()?;
//! let client = SharePointClient::connect(&config).await?;
//! let latest = client
//!     .get_most_recent_file("contoso.sharepoint.com", "/sites/Finance", "Documents", "Exports", false)
//!     .await?;
//! println!("{} created {}", latest.name, latest.created_display());
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]

pub mod auth;
pub mod config;
pub mod error;
pub mod graph;
pub mod sharepoint;

pub use auth::{ClientCredentials, SecureString};
pub use config::Config;
pub use error::{ApiError, AuthError, Result, SharePointError};
pub use graph::{DirectoryListing, DriveItem, ItemKind, ItemSummary, RetryPolicy};
pub use sharepoint::{ClearApplyTo, ClientOptions, DriveRef, SharePointClient, WaitOptions};
