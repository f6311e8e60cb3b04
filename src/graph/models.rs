//! Graph resource models for sites, drives, drive items and workbooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Display format for creation timestamps (`2024-03-01 08:15:00`).
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One page of a Graph collection.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// SharePoint site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Composite id: `{hostname},{site-collection-id},{web-id}`.
    pub id: String,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub web_url: Option<String>,
}

impl Site {
    /// The id without the host name prefix.
    ///
    /// `contoso.sharepoint.com,aaa,bbb` becomes `aaa,bbb`; ids without a
    /// comma are returned unchanged.
    pub fn short_id(&self) -> &str {
        match self.id.split_once(',') {
            Some((_, rest)) => rest,
            None => &self.id,
        }
    }
}

/// Document library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: String,
    pub name: String,
    pub drive_type: Option<String>,
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    pub child_count: Option<u64>,
}

/// File or folder in a drive.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub created_date_time: DateTime<Utc>,
    pub last_modified_date_time: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
    pub size: Option<u64>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
    pub file: Option<FileFacet>,
    pub folder: Option<FolderFacet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Folder,
    File,
    Other,
}

impl DriveItem {
    pub fn kind(&self) -> ItemKind {
        if self.folder.is_some() {
            ItemKind::Folder
        } else if self.file.is_some() {
            ItemKind::File
        } else {
            ItemKind::Other
        }
    }

    pub fn summary(&self) -> ItemSummary {
        let kind = self.kind();
        ItemSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            kind,
            created: self.created_date_time,
            web_url: self.web_url.clone(),
            download_url: match kind {
                ItemKind::File => self.download_url.clone(),
                _ => None,
            },
        }
    }
}

/// Flattened listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(rename = "createdDateTime", serialize_with = "serialize_display_time")]
    pub created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl ItemSummary {
    /// Creation time as `YYYY-MM-DD HH:MM:SS`.
    pub fn created_display(&self) -> String {
        self.created.format(DISPLAY_TIME_FORMAT).to_string()
    }
}

fn serialize_display_time<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&t.format(DISPLAY_TIME_FORMAT).to_string())
}

/// Folders and files of one directory, in listing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectoryListing {
    pub folders: Vec<ItemSummary>,
    pub files: Vec<ItemSummary>,
}

impl DirectoryListing {
    /// Split drive items into folders and files; other items are skipped.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a DriveItem>) -> Self {
        let mut listing = Self::default();
        for item in items {
            match item.kind() {
                ItemKind::Folder => listing.folders.push(item.summary()),
                ItemKind::File => listing.files.push(item.summary()),
                ItemKind::Other => {}
            }
        }
        listing
    }

    pub fn most_recent_file(&self) -> Option<&ItemSummary> {
        most_recent(&self.files)
    }

    pub fn most_recent_folder(&self) -> Option<&ItemSummary> {
        most_recent(&self.folders)
    }
}

/// Newest entry by creation time; among equal times the later one in listing order wins.
pub fn most_recent(items: &[ItemSummary]) -> Option<&ItemSummary> {
    items.iter().max_by_key(|item| item.created)
}

/// Excel pivot table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotTable {
    pub id: String,
    pub name: String,
}

/// Resumable upload session returned by `createUploadSession`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_url: String,
    pub expiration_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}
