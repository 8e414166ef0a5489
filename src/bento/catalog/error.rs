use std::path::PathBuf;

use thiserror::Error;

use crate::bento::catalog::model::EntityKind;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type covering the failures that abort a run. Anything that only
/// affects a single row or a single remote item is reported instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// The tabular source could not be parsed at all.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The hierarchy plan could not be built from the parsed rows.
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    /// Raised when a hierarchical catalog document has an unexpected shape.
    #[error("invalid catalog document: {0}")]
    InvalidCatalog(String),

    /// Raised when the configuration file is malformed or incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// Raised when the HTTP client cannot be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the input path has an extension the tool cannot read or write.
    #[error("unsupported file type: {0}")]
    UnsupportedInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

/// Fatal problems with the tabular source itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("input has no header line")]
    MissingHeader,

    #[error("header is missing required column '{0}'")]
    MissingColumn(String),

    #[error("workbook has no worksheets")]
    EmptyWorkbook,
}

/// A single row that cannot take part in the sync. The row is dropped and
/// logged; the run carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRowError {
    #[error("line {line}: field '{field}' is empty")]
    EmptyField { line: usize, field: &'static str },

    #[error("line {line}: duplicate url '{url}', first seen on line {first_line}")]
    DuplicateUrl {
        line: usize,
        url: String,
        first_line: usize,
    },
}

impl InvalidRowError {
    /// Source line of the offending row.
    pub fn line(&self) -> usize {
        match self {
            InvalidRowError::EmptyField { line, .. } => *line,
            InvalidRowError::DuplicateUrl { line, .. } => *line,
        }
    }
}

/// Invariant failures detected while planning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("{kind} '{key}' references missing parent '{parent}'")]
    DanglingReference {
        kind: EntityKind,
        key: String,
        parent: String,
    },

    #[error("no categories could be planned from {rows} input rows")]
    NoCategories { rows: usize },
}

/// Failures reported by a [`RemoteStore`](crate::bento::catalog::store::RemoteStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request never produced a response (connection, timeout, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status code.
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// A record could not be turned into a request body.
    #[error("could not encode record: {0}")]
    Encode(String),

    /// A natural-key lookup matched more than one record.
    #[error("lookup matched {0} records, expected at most one")]
    Ambiguous(usize),

    /// A fetched record lacks the fields needed to address it for an update.
    #[error("record is missing handle field '{0}'")]
    MissingHandle(String),
}

/// Why a single planned item ended up `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("lookup failed: {0}")]
    Lookup(StoreError),

    #[error("write failed: {0}")]
    Write(StoreError),

    #[error("blocked-by-parent: {0}")]
    BlockedByParent(String),
}

impl ItemError {
    /// Short machine-readable reason tag.
    pub fn reason(&self) -> &'static str {
        match self {
            ItemError::Lookup(_) => "lookup",
            ItemError::Write(_) => "write",
            ItemError::BlockedByParent(_) => "blocked-by-parent",
        }
    }
}
