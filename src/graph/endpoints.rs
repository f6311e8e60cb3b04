//! URL builders for the Graph endpoints used by the client.
//!
//! Drive paths are percent-encoded per segment with `/` kept as separator.
//! Worksheet names, pivot table names and range addresses become OData string
//! literals: single quotes are doubled, then the value is percent-encoded.

use urlencoding::encode;

/// Percent-encode each segment of a drive path, dropping empty segments.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Encode a value for use inside `('...')` in an OData URL.
pub fn odata_literal(value: &str) -> String {
    encode(&value.replace('\'', "''")).into_owned()
}

fn join_folder(folder: &str, name: &str) -> String {
    let folder = encode_path(folder);
    let name = encode_path(name);
    if folder.is_empty() {
        name
    } else {
        format!("{folder}/{name}")
    }
}

fn drive(base: &str, site_id: &str, drive_id: &str) -> String {
    format!("{base}/sites/{site_id}/drives/{drive_id}")
}

/// `GET /sites/{hostname}:{server-relative-path}`
pub fn site_by_path(base: &str, domain: &str, site_name: &str) -> String {
    format!("{base}/sites/{domain}:/{}", encode_path(site_name))
}

/// `GET /sites/{site-id}/drives`
pub fn site_drives(base: &str, site_id: &str) -> String {
    format!("{base}/sites/{site_id}/drives")
}

/// `GET .../items/root:/{path}:/children`, or the root's children for an empty path.
pub fn children_by_path(base: &str, site_id: &str, drive_id: &str, path: &str) -> String {
    let encoded = encode_path(path);
    if encoded.is_empty() {
        format!("{}/items/root/children", drive(base, site_id, drive_id))
    } else {
        format!("{}/items/root:/{encoded}:/children", drive(base, site_id, drive_id))
    }
}

/// `GET .../root:/{folder}/{name}`
pub fn item_by_path(base: &str, site_id: &str, drive_id: &str, folder: &str, name: &str) -> String {
    format!(
        "{}/root:/{}",
        drive(base, site_id, drive_id),
        join_folder(folder, name)
    )
}

/// `.../items/{item-id}`
pub fn item(base: &str, site_id: &str, drive_id: &str, item_id: &str) -> String {
    format!("{}/items/{}", drive(base, site_id, drive_id), encode(item_id))
}

/// `GET .../items/{item-id}/content`
pub fn item_content(base: &str, site_id: &str, drive_id: &str, item_id: &str) -> String {
    format!("{}/content", item(base, site_id, drive_id, item_id))
}

/// `PUT .../root:/{folder}/{name}:/content`
pub fn content_by_path(
    base: &str,
    site_id: &str,
    drive_id: &str,
    folder: &str,
    name: &str,
) -> String {
    format!("{}:/content", item_by_path(base, site_id, drive_id, folder, name))
}

/// `POST .../root:/{folder}/{name}:/createUploadSession`
pub fn upload_session(
    base: &str,
    site_id: &str,
    drive_id: &str,
    folder: &str,
    name: &str,
) -> String {
    format!(
        "{}:/createUploadSession",
        item_by_path(base, site_id, drive_id, folder, name)
    )
}

/// `.../items/{item-id}/workbook/worksheets('{sheet}')`
pub fn worksheet(base: &str, site_id: &str, drive_id: &str, item_id: &str, sheet: &str) -> String {
    format!(
        "{}/workbook/worksheets('{}')",
        item(base, site_id, drive_id, item_id),
        odata_literal(sheet)
    )
}

/// `.../worksheets('{sheet}')/range(address='{address}')`
pub fn worksheet_range(
    base: &str,
    site_id: &str,
    drive_id: &str,
    item_id: &str,
    sheet: &str,
    address: &str,
) -> String {
    format!(
        "{}/range(address='{}')",
        worksheet(base, site_id, drive_id, item_id, sheet),
        odata_literal(address)
    )
}

/// `.../worksheets('{sheet}')/pivotTables`
pub fn pivot_tables(
    base: &str,
    site_id: &str,
    drive_id: &str,
    item_id: &str,
    sheet: &str,
) -> String {
    format!(
        "{}/pivotTables",
        worksheet(base, site_id, drive_id, item_id, sheet)
    )
}

/// `.../worksheets('{sheet}')/pivotTables('{pivot}')`
pub fn pivot_table(
    base: &str,
    site_id: &str,
    drive_id: &str,
    item_id: &str,
    sheet: &str,
    pivot: &str,
) -> String {
    format!(
        "{}('{}')",
        pivot_tables(base, site_id, drive_id, item_id, sheet),
        odata_literal(pivot)
    )
}
