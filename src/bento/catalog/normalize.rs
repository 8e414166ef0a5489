//! Canonical keys and display titles for parsed rows.

use tracing::warn;

use crate::bento::catalog::error::InvalidRowError;
use crate::bento::catalog::model::{NormalizedRow, Row};

/// Canonicalises a single row.
///
/// Keys are trimmed, lower-cased and have inner whitespace collapsed to `-`,
/// so comparisons downstream can stay case-sensitive.
pub fn normalize(row: Row) -> Result<NormalizedRow, InvalidRowError> {
    let line = row.line;
    let url = row.url.trim().to_string();
    if url.is_empty() {
        return Err(InvalidRowError::EmptyField { line, field: "url" });
    }

    let title = row.title.trim().to_string();
    if title.is_empty() {
        return Err(InvalidRowError::EmptyField { line, field: "title" });
    }

    let category = canonical_key(&row.category);
    if category.is_empty() {
        return Err(InvalidRowError::EmptyField {
            line,
            field: "category",
        });
    }

    let subcategory = canonical_key(&row.subcategory);
    if subcategory.is_empty() {
        return Err(InvalidRowError::EmptyField {
            line,
            field: "subcategory",
        });
    }

    let category_title = category_title(&category);
    let subcategory_title = subcategory_title(&subcategory);

    Ok(NormalizedRow {
        row: Row {
            line,
            category,
            subcategory,
            title,
            description: row.description.trim().to_string(),
            url,
            tags: row.tags,
        },
        category_title,
        subcategory_title,
    })
}

/// Normalises every row, splitting accepted rows from rejected ones.
pub fn normalize_rows<I>(rows: I) -> (Vec<NormalizedRow>, Vec<InvalidRowError>)
where
    I: IntoIterator<Item = Row>,
{
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for row in rows {
        match normalize(row) {
            Ok(normalized) => accepted.push(normalized),
            Err(error) => {
                warn!(line = error.line(), %error, "dropping invalid row");
                rejected.push(error);
            }
        }
    }

    (accepted, rejected)
}

/// Lower-cased, trimmed key with whitespace runs replaced by `-`.
pub fn canonical_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// `design` → `Design`.
pub fn category_title(key: &str) -> String {
    capitalize(key)
}

/// `ai-image-tools` → `Ai Image Tools`.
pub fn subcategory_title(key: &str) -> String {
    key.split('-')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
