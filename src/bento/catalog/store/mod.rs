//! Boundary to the remote hierarchical store.
//!
//! The store is addressed the way a PostgREST-style data API is: a collection
//! name plus equality filters. It offers point lookups, inserts and updates but
//! no upsert, so [`SyncEngine`](crate::bento::catalog::engine::SyncEngine)
//! builds one out of a lookup followed by the matching write.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bento::catalog::error::StoreError;
use crate::bento::catalog::model::{
    CategoryRecord, EntityKind, ResourceRecord, SubcategoryRecord,
};

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Conjunction of `field = value` conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyFilter {
    pairs: Vec<(String, String)>,
}

impl KeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((field.into(), value.into()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Returns `true` when every condition holds for `record`.
    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        self.pairs.iter().all(|(field, expected)| {
            record
                .get(field)
                .and_then(scalar_text)
                .is_some_and(|actual| actual == *expected)
        })
    }
}

/// A record as returned by a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRow {
    pub fields: Map<String, Value>,
}

impl RemoteRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds the filter addressing this exact record for an update.
    pub fn handle(&self, handle_fields: &[&str]) -> Result<KeyFilter, StoreError> {
        handle_fields.iter().try_fold(KeyFilter::new(), |filter, field| {
            let value = self
                .fields
                .get(*field)
                .and_then(scalar_text)
                .ok_or_else(|| StoreError::MissingHandle((*field).to_string()))?;
            Ok(filter.with(*field, value))
        })
    }
}

/// Result of a natural-key lookup. Absence is an ordinary answer, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(RemoteRow),
    NotFound,
    Failed(StoreError),
}

impl Lookup {
    /// Classifies a result set that should contain at most one record.
    pub fn from_matches(mut rows: Vec<Map<String, Value>>) -> Self {
        match rows.len() {
            0 => Lookup::NotFound,
            1 => Lookup::Found(RemoteRow::new(rows.remove(0))),
            n => Lookup::Failed(StoreError::Ambiguous(n)),
        }
    }
}

/// Operations the sync engine needs from the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the records in `collection` matching `key`.
    async fn lookup(&self, collection: &str, key: &KeyFilter) -> Lookup;

    /// Creates a new record.
    async fn insert(&self, collection: &str, body: &Value) -> Result<(), StoreError>;

    /// Overwrites the fields in `body` on the record addressed by `handle`.
    async fn update(&self, collection: &str, handle: &KeyFilter, body: &Value)
    -> Result<(), StoreError>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for std::sync::Arc<S> {
    async fn lookup(&self, collection: &str, key: &KeyFilter) -> Lookup {
        (**self).lookup(collection, key).await
    }

    async fn insert(&self, collection: &str, body: &Value) -> Result<(), StoreError> {
        (**self).insert(collection, body).await
    }

    async fn update(
        &self,
        collection: &str,
        handle: &KeyFilter,
        body: &Value,
    ) -> Result<(), StoreError> {
        (**self).update(collection, handle, body).await
    }
}

/// Remote collection names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    pub categories: String,
    pub subcategories: String,
    pub resources: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            categories: "categories".to_string(),
            subcategories: "subcategories".to_string(),
            resources: "resources".to_string(),
        }
    }
}

impl Collections {
    pub fn name(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Category => &self.categories,
            EntityKind::Subcategory => &self.subcategories,
            EntityKind::Resource => &self.resources,
        }
    }
}

/// A record type the engine knows how to reconcile.
pub trait SyncEntity: Serialize + Send + Sync {
    const KIND: EntityKind;

    /// Fields of a fetched record that address it for an update.
    const HANDLE_FIELDS: &'static [&'static str];

    /// Filter locating the record by its natural key.
    fn natural_key(&self) -> KeyFilter;

    /// Natural key rendered for logs and reports.
    fn display_key(&self) -> String;

    /// JSON body sent on insert and update.
    fn to_body(&self) -> Result<Value, StoreError> {
        serde_json::to_value(self).map_err(|err| StoreError::Encode(err.to_string()))
    }
}

impl SyncEntity for CategoryRecord {
    const KIND: EntityKind = EntityKind::Category;
    const HANDLE_FIELDS: &'static [&'static str] = &["id"];

    fn natural_key(&self) -> KeyFilter {
        KeyFilter::new().with("id", &self.id)
    }

    fn display_key(&self) -> String {
        self.id.clone()
    }
}

impl SyncEntity for SubcategoryRecord {
    const KIND: EntityKind = EntityKind::Subcategory;
    const HANDLE_FIELDS: &'static [&'static str] = &["category_id", "id"];

    fn natural_key(&self) -> KeyFilter {
        KeyFilter::new()
            .with("id", &self.id)
            .with("category_id", &self.category_id)
    }

    fn display_key(&self) -> String {
        format!("{}/{}", self.category_id, self.id)
    }
}

impl SyncEntity for ResourceRecord {
    const KIND: EntityKind = EntityKind::Resource;
    const HANDLE_FIELDS: &'static [&'static str] = &["id"];

    fn natural_key(&self) -> KeyFilter {
        KeyFilter::new().with("url", &self.url)
    }

    fn display_key(&self) -> String {
        self.url.clone()
    }
}

/// Text form of a scalar JSON value, used for filter comparisons.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
