//! Flattens the hierarchical catalog into the tabular export: one row per
//! leaf item, with its category and subcategory keys repeated on every row.

use crate::bento::catalog::model::{COLUMNS, CatalogCategory};

/// Sheet name used when the table is written to a workbook.
pub const CATALOG_SHEET: &str = "catalog";

/// A table that will be materialised as delimited text or an Excel sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Builds the export table. Row order follows category, subcategory and
/// item order in the input.
pub fn flatten_catalog(categories: &[CatalogCategory]) -> SheetTable {
    let mut rows = Vec::new();

    for category in categories {
        for subcategory in &category.subcategories {
            for item in &subcategory.items {
                rows.push(vec![
                    single_line(&category.id),
                    single_line(&subcategory.id),
                    single_line(&item.title),
                    single_line(&item.description),
                    single_line(&item.url),
                    single_line(&item.tags.join(",")),
                ]);
            }
        }
    }

    SheetTable {
        sheet_name: CATALOG_SHEET.to_string(),
        columns: COLUMNS.iter().map(|column| column.to_string()).collect(),
        rows,
    }
}

/// Renders the table as comma-separated text with a header line.
pub fn render_delimited(table: &SheetTable) -> String {
    let mut output = String::new();
    push_line(&mut output, &table.columns);
    for row in &table.rows {
        push_line(&mut output, row);
    }
    output
}

fn push_line(output: &mut String, cells: &[String]) {
    let line: Vec<String> = cells.iter().map(|cell| quote_field(cell)).collect();
    output.push_str(&line.join(","));
    output.push('\n');
}

/// Quotes a cell when it holds a delimiter, a quote or edge whitespace.
/// Embedded quotes are doubled.
pub fn quote_field(value: &str) -> String {
    let needs_quotes = value.contains([',', '"'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// The reader is line-based, so cells never carry line breaks.
fn single_line(value: &str) -> String {
    if value.contains(['\n', '\r']) {
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        value.to_string()
    }
}
