use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};

use crate::bento::catalog::error::{ParseError, Result, SyncError};
use crate::bento::catalog::io::tabular::{build_record, validate_headers};
use crate::bento::catalog::model::Row;

/// Reads catalog rows from the first worksheet of an `.xlsx` export.
///
/// The sheet follows the same conventions as the delimited export: a header
/// row, then one resource per row. Row numbers in the result are 1-based
/// sheet rows.
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SyncError::Parse(ParseError::EmptyWorkbook))?
        .map_err(SyncError::from)?;
    rows_from_range(&range)
}

fn rows_from_range(range: &Range<DataType>) -> Result<Vec<Row>> {
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let mut rows = range
        .rows()
        .enumerate()
        .map(|(index, cells)| (first_row + index + 1, cells))
        .filter(|(_, cells)| cells.iter().any(|cell| !cell_to_string(Some(cell)).is_empty()));

    let Some((_, header_cells)) = rows.next() else {
        return Err(ParseError::MissingHeader.into());
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|cell| cell_to_string(Some(cell)).to_lowercase())
        .collect();
    validate_headers(&headers)?;

    Ok(rows
        .map(|(line, cells)| {
            let values = cells.iter().map(|cell| cell_to_string(Some(cell))).collect();
            build_record(&headers, values, line).to_row()
        })
        .collect())
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    let text = match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    };
    text.trim().to_string()
}
