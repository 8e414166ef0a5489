use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::bento::catalog::error::StoreError;
use crate::bento::catalog::store::{KeyFilter, Lookup, RemoteStore};

/// Kind of request a store received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Lookup,
    Insert,
    Update,
}

/// One recorded request against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub operation: Operation,
    pub collection: String,
    /// Lookup key or update handle; `None` for inserts.
    pub filter: Option<KeyFilter>,
    /// Insert or update body; `None` for lookups.
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, Vec<Map<String, Value>>>,
    next_id: u64,
    calls: Vec<StoreCall>,
}

/// Process-local store with the same lookup/insert/update semantics as the
/// REST store. Records inserted without an `id` get a sequential numeric one,
/// the way a serial primary key would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every collection's records, in insertion order.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Map<String, Value>>> {
        self.lock().collections.clone()
    }

    /// Records currently held in `collection`.
    pub fn records(&self, collection: &str) -> Vec<Map<String, Value>> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Every mutation completes before the guard drops, so poisoned state is still consistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn lookup(&self, collection: &str, key: &KeyFilter) -> Lookup {
        let mut state = self.lock();
        state.calls.push(StoreCall {
            operation: Operation::Lookup,
            collection: collection.to_string(),
            filter: Some(key.clone()),
            body: None,
        });
        let matches = state
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| key.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Lookup::from_matches(matches)
    }

    async fn insert(&self, collection: &str, body: &Value) -> Result<(), StoreError> {
        let mut record = body
            .as_object()
            .cloned()
            .ok_or_else(|| StoreError::Decode("insert body is not an object".into()))?;

        let mut state = self.lock();
        state.calls.push(StoreCall {
            operation: Operation::Insert,
            collection: collection.to_string(),
            filter: None,
            body: Some(body.clone()),
        });
        if !record.contains_key("id") {
            state.next_id += 1;
            record.insert("id".to_string(), Value::from(state.next_id));
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        handle: &KeyFilter,
        body: &Value,
    ) -> Result<(), StoreError> {
        let patch = body
            .as_object()
            .ok_or_else(|| StoreError::Decode("update body is not an object".into()))?;

        let mut state = self.lock();
        state.calls.push(StoreCall {
            operation: Operation::Update,
            collection: collection.to_string(),
            filter: Some(handle.clone()),
            body: Some(body.clone()),
        });
        let records = state.collections.entry(collection.to_string()).or_default();
        for record in records.iter_mut().filter(|record| handle.matches(record)) {
            for (field, value) in patch {
                record.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }
}
