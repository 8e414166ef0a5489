//! Core library for the bento-sync command line application.
//!
//! The library keeps the curated resource catalog in step between its flat
//! tabular export and the remote store that backs the catalog site. Readers
//! and writers for the export live under [`bento::catalog::io`], the record
//! types in [`bento::catalog::model`], row canonicalisation and hierarchy
//! derivation in [`bento::catalog::normalize`] and [`bento::catalog::plan`],
//! the remote store boundary in [`bento::catalog::store`], and the phased
//! reconciliation in [`bento::catalog::engine`] with its
//! [`bento::catalog::report`]. [`bento::catalog::sync`] ties the pieces
//! together for the CLI.

pub mod bento;

pub use bento::catalog::{
    Result, SyncError, config, engine, error, flatten, io, model, normalize, plan, report, store,
    sync,
};
