//! Excel workbook operations on files stored in SharePoint.

use std::ops::Range;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::client::SharePointClient;
use crate::error::{Result, SharePointError};
use crate::graph::endpoints;
use crate::graph::models::PivotTable;
use crate::graph::GraphRequest;

/// What `range/clear` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClearApplyTo {
    All,
    Formats,
    Contents,
}

impl SharePointClient {
    /// Set the number format of a range, e.g. `"@"` for text.
    #[allow(clippy::too_many_arguments)]
    pub async fn set_range_number_format(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
        address: &str,
        number_format: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/format",
            endpoints::worksheet_range(self.session.base_url(), site_id, drive_id, item_id, sheet, address)
        );
        info!("Setting format '{}' for range '{}'...", number_format, address);

        let body = json!({ "numberFormat": { "format": number_format } });
        self.session
            .send_empty(GraphRequest::patch(url).json(body))
            .await?;

        info!("Format updated for range '{}'", address);
        Ok(())
    }

    /// Clear a range. `None` lets the service apply its default (everything).
    pub async fn clear_worksheet_range(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
        address: &str,
        apply_to: Option<ClearApplyTo>,
    ) -> Result<()> {
        let url = format!(
            "{}/clear",
            endpoints::worksheet_range(self.session.base_url(), site_id, drive_id, item_id, sheet, address)
        );
        info!("Clearing range '{}' in worksheet '{}'...", address, sheet);

        let mut request = GraphRequest::post(url);
        if let Some(apply_to) = apply_to {
            request = request.json(json!({ "applyTo": apply_to }));
        }
        self.session.send_empty(request).await?;

        info!("Range '{}' cleared", address);
        Ok(())
    }

    /// Write `values` into `address`.
    ///
    /// `rows` is the zero-based row span of this chunk within the caller's
    /// table and is only used for reporting. Throttling and
    /// `MaxRequestDurationExceeded` responses are retried by the session.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_range_data(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
        address: &str,
        values: &[Vec<Value>],
        rows: Range<usize>,
    ) -> Result<()> {
        let url =
            endpoints::worksheet_range(self.session.base_url(), site_id, drive_id, item_id, sheet, address);

        let result = self
            .session
            .send_empty(GraphRequest::patch(url).json(json!({ "values": values })))
            .await;

        match result {
            Ok(_) => {
                info!("Updated rows {} to {}", rows.start + 1, rows.end);
                Ok(())
            }
            Err(e) => {
                error!("Failed to update rows {} to {}: {}", rows.start + 1, rows.end, e);
                Err(e)
            }
        }
    }

    /// Write a table in row chunks starting at column A of `first_row` (1-based).
    ///
    /// Every row must have the same number of cells. Returns the number of
    /// chunks written.
    #[allow(clippy::too_many_arguments)]
    pub async fn write_rows_in_chunks(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
        first_row: usize,
        values: &[Vec<Value>],
        chunk_rows: usize,
    ) -> Result<usize> {
        let plan = plan_chunks(first_row, values, chunk_rows)?;

        for (address, rows) in &plan {
            self.update_range_data(
                site_id,
                drive_id,
                item_id,
                sheet,
                address,
                &values[rows.clone()],
                rows.clone(),
            )
            .await?;
        }

        Ok(plan.len())
    }

    /// Refresh every pivot table on a worksheet.
    ///
    /// On failure the sheet's pivot tables are fetched and logged before the
    /// error is returned.
    pub async fn refresh_pivot_table(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/refreshAll",
            endpoints::pivot_tables(self.session.base_url(), site_id, drive_id, item_id, sheet)
        );

        match self.session.send_empty(GraphRequest::post(url)).await {
            Ok(_) => {
                info!("Pivot tables on '{}' refreshed", sheet);
                Ok(())
            }
            Err(e) => {
                error!("Failed to refresh pivot tables on '{}': {}", sheet, e);
                self.log_pivot_diagnostics(site_id, drive_id, item_id, sheet)
                    .await;
                Err(e)
            }
        }
    }

    /// Refresh one pivot table through the beta endpoint.
    pub async fn refresh_individual_pivot_table(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
        pivot_table: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/refresh",
            endpoints::pivot_table(self.session.beta_url(), site_id, drive_id, item_id, sheet, pivot_table)
        );

        self.session.send_empty(GraphRequest::post(url)).await?;
        info!("Pivot table '{}' refreshed", pivot_table);
        Ok(())
    }

    /// Pivot tables on a worksheet.
    pub async fn list_pivot_tables(
        &self,
        site_id: &str,
        drive_id: &str,
        item_id: &str,
        sheet: &str,
    ) -> Result<Vec<PivotTable>> {
        let url = endpoints::pivot_tables(self.session.base_url(), site_id, drive_id, item_id, sheet);
        self.session.get_all_pages(&url).await
    }

    async fn log_pivot_diagnostics(&self, site_id: &str, drive_id: &str, item_id: &str, sheet: &str) {
        match self.list_pivot_tables(site_id, drive_id, item_id, sheet).await {
            Ok(tables) => {
                let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
                warn!("Diagnostic: pivot tables on '{}': {:?}", sheet, names);
            }
            Err(e) => warn!("Diagnostic: could not list pivot tables on '{}': {}", sheet, e),
        }
    }
}

/// Spreadsheet column letters for a zero-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// A1 address and row span of each chunk.
fn plan_chunks(
    first_row: usize,
    values: &[Vec<Value>],
    chunk_rows: usize,
) -> Result<Vec<(String, Range<usize>)>> {
    if first_row == 0 {
        return Err(SharePointError::InvalidInput("rows are 1-based".into()));
    }
    if chunk_rows == 0 {
        return Err(SharePointError::InvalidInput("chunk size must be positive".into()));
    }
    let width = match values.first() {
        Some(row) if !row.is_empty() => row.len(),
        Some(_) => return Err(SharePointError::InvalidInput("rows have no cells".into())),
        None => return Ok(Vec::new()),
    };
    if let Some(pos) = values.iter().position(|row| row.len() != width) {
        return Err(SharePointError::InvalidInput(format!(
            "row {} has {} cells, expected {}",
            pos,
            values[pos].len(),
            width
        )));
    }

    let last_column = column_letters(width - 1);
    let plan = (0..values.len())
        .step_by(chunk_rows)
        .map(|start| {
            let end = (start + chunk_rows).min(values.len());
            let address = format!(
                "A{}:{}{}",
                first_row + start,
                last_column,
                first_row + end - 1
            );
            (address, start..end)
        })
        .collect();
    Ok(plan)
}
