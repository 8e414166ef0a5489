//! Adapters between files on disk and the in-memory catalog types.

pub mod catalog_json;
pub mod tabular;
pub mod xlsx_read;
pub mod xlsx_write;
