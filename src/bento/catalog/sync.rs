use std::fs;
use std::path::Path;

use tracing::{debug, info, instrument};

use crate::bento::catalog::engine::SyncEngine;
use crate::bento::catalog::error::{Result, SyncError};
use crate::bento::catalog::flatten::{flatten_catalog, render_delimited};
use crate::bento::catalog::io::catalog_json;
use crate::bento::catalog::io::tabular::TabularDocument;
use crate::bento::catalog::io::xlsx_read;
use crate::bento::catalog::io::xlsx_write;
use crate::bento::catalog::model::Row;
use crate::bento::catalog::plan::{PlanOptions, SyncPlan};
use crate::bento::catalog::report::RunReport;
use crate::bento::catalog::store::RemoteStore;

/// On-disk encodings of the tabular export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    /// Comma-separated text.
    Delimited,
    /// First sheet of an `.xlsx` workbook.
    Workbook,
}

impl TabularFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") | Some("txt") => Ok(TabularFormat::Delimited),
            Some("xlsx") => Ok(TabularFormat::Workbook),
            _ => Err(SyncError::UnsupportedInput(path.to_path_buf())),
        }
    }
}

/// Reads every row of a tabular export, valid or not.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn read_rows(input: &Path) -> Result<Vec<Row>> {
    if !input.exists() {
        return Err(SyncError::MissingInput(input.to_path_buf()));
    }

    let rows = match TabularFormat::from_path(input)? {
        TabularFormat::Delimited => {
            let source = fs::read_to_string(input)?;
            let document = TabularDocument::parse(&source)?;
            debug!(headers = ?document.headers(), "header parsed");
            document.rows()
        }
        TabularFormat::Workbook => xlsx_read::read_rows(input)?,
    };
    info!(row_count = rows.len(), "read rows from tabular export");
    Ok(rows)
}

/// Parses, normalises and plans a tabular export without touching the store.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn plan_file(input: &Path, options: &PlanOptions) -> Result<SyncPlan> {
    let rows = read_rows(input)?;
    let plan = SyncPlan::from_rows(rows, options)?;
    info!(
        categories = plan.categories.len(),
        subcategories = plan.subcategories.len(),
        resources = plan.resources.len(),
        rejected = plan.rejections.len(),
        "plan built"
    );
    Ok(plan)
}

/// Full pipeline: plan the export, then reconcile it against the store.
///
/// Only a source that cannot be read or planned is an error; item-level
/// failures are returned inside the report.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub async fn sync_file<S: RemoteStore>(
    input: &Path,
    engine: &SyncEngine<S>,
    options: &PlanOptions,
) -> Result<RunReport> {
    let plan = plan_file(input, options)?;
    Ok(engine.run(&plan).await)
}

/// Flattens hierarchical catalog JSON into a tabular export.
/// Returns the number of rows written.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub fn catalog_to_tabular(input: &Path, output: &Path) -> Result<usize> {
    let format = TabularFormat::from_path(output)?;
    let categories = catalog_json::read_catalog(input)?;
    info!(category_count = categories.len(), "read hierarchical catalog");

    let table = flatten_catalog(&categories);
    match format {
        TabularFormat::Delimited => fs::write(output, render_delimited(&table))?,
        TabularFormat::Workbook => xlsx_write::write_workbook(output, &table)?,
    }
    Ok(table.rows.len())
}
