//! Microsoft Graph plumbing: authenticated session, retry policy, endpoints and models.

pub mod endpoints;
pub mod models;
pub mod retry;
pub mod session;

pub use models::{DirectoryListing, Drive, DriveItem, ItemKind, ItemSummary, PivotTable, Site};
pub use retry::RetryPolicy;
pub use session::{GraphRequest, GraphSession, RequestBody};
