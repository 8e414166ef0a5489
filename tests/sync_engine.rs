use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bento_sync::engine::SyncEngine;
use bento_sync::error::StoreError;
use bento_sync::model::{EntityKind, Row};
use bento_sync::plan::{PlanOptions, SyncPlan};
use bento_sync::report::RunReport;
use bento_sync::store::memory::Operation;
use bento_sync::store::{KeyFilter, Lookup, MemoryStore, RemoteStore};
use bento_sync::sync;
use serde_json::Value;
use tempfile::tempdir;

fn row(line: usize, category: &str, subcategory: &str, title: &str, url: &str) -> Row {
    Row {
        line,
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        title: title.to_string(),
        description: format!("About {title}"),
        url: url.to_string(),
        tags: vec!["ui".to_string(), "ux".to_string()],
    }
}

fn catalog_plan() -> SyncPlan {
    SyncPlan::from_rows(
        vec![
            row(2, "design", "ux", "Figma", "https://figma.test"),
            row(3, "design", "tools", "Sketch", "https://sketch.test"),
            row(4, "ai", "llm", "Model", "https://model.test"),
            row(5, "ai", "image-tools", "Painter", "https://painter.test"),
            row(6, "dev", "tools", "Editor", "https://editor.test"),
        ],
        &PlanOptions::default(),
    )
    .expect("plan built")
}

fn filter_value<'a>(filter: &'a KeyFilter, field: &str) -> Option<&'a str> {
    filter
        .pairs()
        .iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value.as_str())
}

const AI_URLS: [&str; 2] = ["https://model.test", "https://painter.test"];

/// Asserts that nothing below the `ai` category reached the store.
fn assert_ai_subtree_untouched(store: &MemoryStore) {
    for call in store.calls() {
        if call.collection == "subcategories" {
            let filter = call.filter.as_ref().expect("subcategory calls carry filters");
            assert_ne!(filter_value(filter, "category_id"), Some("ai"));
            if let Some(body) = &call.body {
                assert_ne!(body["category_id"], "ai");
            }
        }
        if call.collection == "resources" {
            let url = call
                .filter
                .as_ref()
                .and_then(|filter| filter_value(filter, "url").map(str::to_string))
                .or_else(|| {
                    call.body
                        .as_ref()
                        .and_then(|body| body["url"].as_str().map(str::to_string))
                });
            assert!(
                url.as_deref().is_none_or(|url| !AI_URLS.contains(&url)),
                "resource call for {url:?} under a failed category"
            );
        }
    }
}

/// Asserts the tallies and failure list of a run in which only the `ai`
/// category itself failed, for `reason`.
fn assert_ai_subtree_blocked(report: &RunReport, reason: &str) {
    let category = report.tally(EntityKind::Category);
    assert_eq!((category.created, category.failed, category.blocked), (2, 1, 0));
    let subcategory = report.tally(EntityKind::Subcategory);
    assert_eq!((subcategory.created, subcategory.failed, subcategory.blocked), (3, 2, 2));
    let resource = report.tally(EntityKind::Resource);
    assert_eq!((resource.created, resource.failed, resource.blocked), (3, 2, 2));

    let category_failure = report
        .failures_for(EntityKind::Category)
        .next()
        .expect("category failure");
    assert_eq!(category_failure.key, "ai");
    assert_eq!(category_failure.reason, reason);

    let blocked: Vec<&str> = report
        .failures
        .iter()
        .filter(|failure| failure.reason == "blocked-by-parent")
        .map(|failure| failure.key.as_str())
        .collect();
    assert_eq!(
        blocked,
        vec![
            "ai/llm",
            "ai/image-tools",
            "https://model.test",
            "https://painter.test"
        ]
    );
}

/// Delegates to a [`MemoryStore`] but fails selected requests before they
/// reach it.
struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing_lookup: Option<(String, KeyFilter)>,
    failing_insert: Option<(String, KeyFilter)>,
}

impl FaultyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            failing_lookup: None,
            failing_insert: None,
        }
    }
}

#[async_trait]
impl RemoteStore for FaultyStore {
    async fn lookup(&self, collection: &str, key: &KeyFilter) -> Lookup {
        if let Some((failing_collection, failing_key)) = &self.failing_lookup {
            if failing_collection == collection && failing_key == key {
                return Lookup::Failed(StoreError::Transport("connection reset".into()));
            }
        }
        self.inner.lookup(collection, key).await
    }

    async fn insert(&self, collection: &str, body: &Value) -> Result<(), StoreError> {
        let rejected = self.failing_insert.as_ref().is_some_and(|(failing_collection, key)| {
            failing_collection == collection && body.as_object().is_some_and(|record| key.matches(record))
        });
        if rejected {
            return Err(StoreError::Status {
                status: 500,
                body: "insert rejected".into(),
            });
        }
        self.inner.insert(collection, body).await
    }

    async fn update(
        &self,
        collection: &str,
        handle: &KeyFilter,
        body: &Value,
    ) -> Result<(), StoreError> {
        self.inner.update(collection, handle, body).await
    }
}

#[tokio::test]
async fn second_run_updates_everything_and_converges() {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::clone(&store)).with_concurrency(4);
    let plan = catalog_plan();

    let first = engine.run(&plan).await;
    assert!(!first.has_failures());
    assert_eq!(first.tally(EntityKind::Category).created, 3);
    assert_eq!(first.tally(EntityKind::Subcategory).created, 5);
    assert_eq!(first.tally(EntityKind::Resource).created, 5);
    let after_first = store.snapshot();

    let second = engine.run(&plan).await;
    assert_eq!(store.snapshot(), after_first);
    for kind in EntityKind::ALL {
        let tally = second.tally(kind);
        assert_eq!(tally.created, 0, "{kind} created on second run");
        assert_eq!(tally.updated, plan.count(kind), "{kind} not updated");
        assert_eq!(tally.failed, 0);
    }

    assert_eq!(store.records("categories").len(), 3);
    assert_eq!(store.records("subcategories").len(), 5);
    assert_eq!(store.records("resources").len(), 5);
}

#[tokio::test]
async fn phases_run_strictly_in_dependency_order() {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::clone(&store)).with_concurrency(8);
    engine.run(&catalog_plan()).await;

    let collections: Vec<String> = store
        .calls()
        .into_iter()
        .map(|call| call.collection)
        .collect();
    let last = |name: &str| collections.iter().rposition(|c| c == name).expect("calls");
    let first = |name: &str| collections.iter().position(|c| c == name).expect("calls");

    assert!(last("categories") < first("subcategories"));
    assert!(last("subcategories") < first("resources"));
}

#[tokio::test]
async fn failed_category_blocks_its_whole_subtree() {
    let inner = Arc::new(MemoryStore::new());
    let mut store = FaultyStore::new(Arc::clone(&inner));
    store.failing_lookup = Some(("categories".into(), KeyFilter::new().with("id", "ai")));
    let engine = SyncEngine::new(store);

    let report = engine.run(&catalog_plan()).await;

    assert_ai_subtree_blocked(&report, "lookup");
    assert_ai_subtree_untouched(&inner);
    assert!(
        inner
            .records("categories")
            .iter()
            .all(|record| record["id"] != "ai")
    );
}

#[tokio::test]
async fn failed_category_insert_blocks_its_whole_subtree() {
    let inner = Arc::new(MemoryStore::new());
    let mut store = FaultyStore::new(Arc::clone(&inner));
    store.failing_insert = Some(("categories".into(), KeyFilter::new().with("id", "ai")));
    let engine = SyncEngine::new(store);

    let report = engine.run(&catalog_plan()).await;

    assert_ai_subtree_blocked(&report, "write");
    assert_ai_subtree_untouched(&inner);
    assert_eq!(inner.records("categories").len(), 2);
}

#[tokio::test]
async fn ambiguous_category_match_blocks_its_whole_subtree() {
    let store = Arc::new(MemoryStore::new());
    for title in ["Ai", "AI"] {
        store
            .insert("categories", &serde_json::json!({"id": "ai", "title": title}))
            .await
            .expect("seed record");
    }
    store.clear_calls();
    let engine = SyncEngine::new(Arc::clone(&store));

    let report = engine.run(&catalog_plan()).await;

    assert_ai_subtree_blocked(&report, "lookup");
    assert_ai_subtree_untouched(&store);
    let ai_writes = store
        .calls()
        .into_iter()
        .filter(|call| call.collection == "categories" && call.operation != Operation::Lookup)
        .filter(|call| call.body.as_ref().is_some_and(|body| body["id"] == "ai"))
        .count();
    assert_eq!(ai_writes, 0);
    assert_eq!(store.records("categories").len(), 4);
}

#[tokio::test]
async fn failed_subcategory_blocks_only_its_resources() {
    let inner = Arc::new(MemoryStore::new());
    let mut store = FaultyStore::new(Arc::clone(&inner));
    store.failing_lookup = Some((
        "subcategories".into(),
        KeyFilter::new().with("id", "tools").with("category_id", "design"),
    ));
    let engine = SyncEngine::new(store);

    let report = engine.run(&catalog_plan()).await;

    assert_eq!(report.tally(EntityKind::Category).failed, 0);
    assert_eq!(report.tally(EntityKind::Subcategory).failed, 1);
    let resource = report.tally(EntityKind::Resource);
    assert_eq!((resource.created, resource.blocked), (4, 1));
    assert!(
        report
            .failures
            .iter()
            .any(|failure| failure.key == "https://sketch.test"
                && failure.reason == "blocked-by-parent")
    );
    // dev/tools shares the key "tools" but lives under another category.
    assert!(
        inner
            .records("resources")
            .iter()
            .any(|record| record["url"] == "https://editor.test")
    );
}

#[tokio::test]
async fn write_failure_is_isolated_to_the_item() {
    let inner = Arc::new(MemoryStore::new());
    let mut store = FaultyStore::new(Arc::clone(&inner));
    store.failing_insert = Some((
        "resources".into(),
        KeyFilter::new().with("url", "https://model.test"),
    ));
    let engine = SyncEngine::new(store);

    let report = engine.run(&catalog_plan()).await;

    let resource = report.tally(EntityKind::Resource);
    assert_eq!((resource.created, resource.failed, resource.blocked), (4, 1, 0));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].reason, "write");
    assert_eq!(report.failures[0].key, "https://model.test");
    assert_eq!(inner.records("resources").len(), 4);
}

#[tokio::test]
async fn update_addresses_the_stored_surrogate_id() {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::clone(&store));
    let plan = catalog_plan();
    engine.run(&plan).await;
    store.clear_calls();

    engine.run(&plan).await;

    let resource_updates: Vec<KeyFilter> = store
        .calls()
        .into_iter()
        .filter(|call| call.operation == Operation::Update && call.collection == "resources")
        .filter_map(|call| call.filter)
        .collect();
    assert_eq!(resource_updates.len(), 5);
    for handle in &resource_updates {
        assert_eq!(handle.pairs().len(), 1);
        assert!(filter_value(handle, "id").is_some());
    }
    assert!(
        store
            .calls()
            .iter()
            .all(|call| call.operation != Operation::Insert)
    );
}

/// Counts how many lookups are in flight at once.
#[derive(Default)]
struct SlowStore {
    inner: MemoryStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl RemoteStore for SlowStore {
    async fn lookup(&self, collection: &str, key: &KeyFilter) -> Lookup {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.lookup(collection, key).await
    }

    async fn insert(&self, collection: &str, body: &Value) -> Result<(), StoreError> {
        self.inner.insert(collection, body).await
    }

    async fn update(
        &self,
        collection: &str,
        handle: &KeyFilter,
        body: &Value,
    ) -> Result<(), StoreError> {
        self.inner.update(collection, handle, body).await
    }
}

#[tokio::test]
async fn concurrency_is_bounded_per_phase() {
    let rows = (0..9)
        .map(|index| {
            row(
                index + 2,
                &format!("cat{index}"),
                "misc",
                "Item",
                &format!("https://{index}.test"),
            )
        })
        .collect::<Vec<_>>();
    let plan = SyncPlan::from_rows(rows, &PlanOptions::default()).expect("plan built");

    let store = Arc::new(SlowStore::default());
    let engine = SyncEngine::new(Arc::clone(&store)).with_concurrency(3);
    let report = engine.run(&plan).await;

    assert!(!report.has_failures());
    let peak = store.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency {peak} exceeded the bound");
    assert!(peak >= 2, "lookups never overlapped");
}

#[tokio::test]
async fn sync_file_reports_rejected_rows_and_syncs_the_rest() {
    let temp_dir = tempdir().expect("temporary directory");
    let csv_path = temp_dir.path().join("catalog.csv");
    fs::write(
        &csv_path,
        "category,subcategory,title,description,url,tags\n\
         design,ux,\"Tool, Pro\",\"A \"\"great\"\" tool\",https://x.test,ux,pro\n\
         \n\
         Design,UX,Missing url,,,\n\
         design,ux,Dup,,https://x.test,\n",
    )
    .expect("CSV written");

    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::clone(&store));
    let report = sync::sync_file(&csv_path, &engine, &PlanOptions::default())
        .await
        .expect("sync completed");

    assert_eq!(report.rejected_rows.len(), 2);
    assert_eq!(report.rejected_rows[0].line, 4);
    assert_eq!(report.rejected_rows[1].line, 5);
    assert_eq!(report.tally(EntityKind::Resource).created, 1);

    let resources = store.records("resources");
    assert_eq!(resources[0]["title"], "Tool, Pro");
    assert_eq!(resources[0]["description"], "A \"great\" tool");
    assert_eq!(resources[0]["tags"], serde_json::json!(["ux", "pro"]));
    let categories = store.records("categories");
    assert_eq!(categories[0]["title"], "Design");
    assert_eq!(categories[0]["icon"], "folder");
}

#[tokio::test]
async fn unreadable_source_aborts_before_any_store_call() {
    let temp_dir = tempdir().expect("temporary directory");
    let csv_path = temp_dir.path().join("catalog.csv");
    fs::write(&csv_path, "name,link\nfoo,https://foo.test\n").expect("CSV written");

    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::clone(&store));
    let error = sync::sync_file(&csv_path, &engine, &PlanOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(error, bento_sync::SyncError::Parse(_)));
    assert!(store.calls().is_empty());
}
