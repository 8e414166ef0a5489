use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::bento::catalog::error::{Result, SyncError};
use crate::bento::catalog::model::CatalogCategory;

/// Loads hierarchical catalog data from a file or a directory of `*.json`
/// files. Directory entries are read in file-name order.
pub fn read_catalog(path: &Path) -> Result<Vec<CatalogCategory>> {
    if !path.exists() {
        return Err(SyncError::MissingInput(path.to_path_buf()));
    }

    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<_>>()?;
        files.retain(|file| file.extension().is_some_and(|ext| ext == "json"));
        files.sort();

        let mut categories = Vec::new();
        for file in files {
            categories.extend(read_catalog_file(&file)?);
        }
        Ok(categories)
    } else {
        read_catalog_file(path)
    }
}

fn read_catalog_file(path: &Path) -> Result<Vec<CatalogCategory>> {
    let source = fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&source)?;
    parse_catalog_document(&json)
        .map_err(|err| SyncError::InvalidCatalog(format!("{}: {err}", path.display())))
}

/// Accepts a single category object or an array of them.
pub fn parse_catalog_document(document: &Value) -> Result<Vec<CatalogCategory>> {
    match document {
        Value::Array(items) => items.iter().map(parse_category).collect(),
        Value::Object(_) => Ok(vec![parse_category(document)?]),
        _ => Err(SyncError::InvalidCatalog(
            "expected a category object or an array of categories".into(),
        )),
    }
}

fn parse_category(value: &Value) -> Result<CatalogCategory> {
    CatalogCategory::deserialize(value).map_err(|err| SyncError::InvalidCatalog(err.to_string()))
}
