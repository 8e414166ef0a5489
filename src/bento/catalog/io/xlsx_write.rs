use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::bento::catalog::error::Result;
use crate::bento::catalog::flatten::SheetTable;

/// Writes the export table to a single-sheet workbook at `path`.
pub fn write_workbook(path: &Path, table: &SheetTable) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&table.sheet_name)?;

    let header_format = Format::new().set_bold();
    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_idx as u16, header, &header_format)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            worksheet.write_string((row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    let last_col = (table.columns.len() as u16).saturating_sub(1);
    worksheet.autofilter(0, 0, table.rows.len() as u32, last_col)?;

    workbook.save(path)?;
    Ok(())
}
