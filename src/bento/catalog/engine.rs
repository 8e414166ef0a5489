//! Phased create-or-update reconciliation against a [`RemoteStore`].
//!
//! Categories are reconciled first, then subcategories, then resources. A
//! phase finishes completely before the next one starts, and a child whose
//! parent failed is never sent to the store: it is recorded as
//! `blocked-by-parent` instead.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::bento::catalog::error::ItemError;
use crate::bento::catalog::model::{EntityKind, SubcategoryKey};
use crate::bento::catalog::plan::SyncPlan;
use crate::bento::catalog::report::{ItemOutcome, Outcome, RunReport};
use crate::bento::catalog::store::{Collections, Lookup, RemoteStore, SyncEntity};

/// Items reconciled concurrently within a phase unless configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Drives a [`SyncPlan`] into a store.
#[derive(Debug)]
pub struct SyncEngine<S> {
    store: S,
    collections: Collections,
    concurrency: usize,
}

impl<S: RemoteStore> SyncEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            collections: Collections::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_collections(mut self, collections: Collections) -> Self {
        self.collections = collections;
        self
    }

    /// Sets the per-phase worker bound. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs all three phases and returns the finished report.
    #[instrument(
        level = "info",
        skip_all,
        fields(
            categories = plan.categories.len(),
            subcategories = plan.subcategories.len(),
            resources = plan.resources.len()
        )
    )]
    pub async fn run(&self, plan: &SyncPlan) -> RunReport {
        let mut report = RunReport::new();
        report.record_rejections(&plan.rejections);

        let outcomes = self
            .run_phase(plan.categories.as_slice(), |_| None)
            .await;
        let failed_categories: HashSet<String> = outcomes
            .iter()
            .filter(|outcome| outcome.is_failed())
            .map(|outcome| outcome.key.clone())
            .collect();
        report.record_phase(EntityKind::Category, &outcomes);

        let outcomes = self
            .run_phase(plan.subcategories.as_slice(), |subcategory| {
                failed_categories
                    .contains(&subcategory.category_id)
                    .then(|| format!("category '{}' failed", subcategory.category_id))
            })
            .await;
        let failed_subcategories: HashSet<SubcategoryKey> = plan
            .subcategories
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.is_failed())
            .map(|(subcategory, _)| subcategory.key())
            .collect();
        report.record_phase(EntityKind::Subcategory, &outcomes);

        let outcomes = self
            .run_phase(plan.resources.as_slice(), |resource| {
                failed_subcategories.contains(&resource.parent_key()).then(|| {
                    format!(
                        "subcategory '{}/{}' failed",
                        resource.category_id, resource.subcategory_id
                    )
                })
            })
            .await;
        report.record_phase(EntityKind::Resource, &outcomes);

        report.finish();
        info!(
            run_id = %report.run_id,
            failures = report.failure_count(),
            "sync run finished"
        );
        report
    }

    /// Reconciles every item of one kind, up to `concurrency` at a time.
    /// Outcomes come back in item order.
    async fn run_phase<E, F>(&self, items: &[E], blocked_by: F) -> Vec<ItemOutcome>
    where
        E: SyncEntity,
        F: Fn(&E) -> Option<String>,
    {
        let collection = self.collections.name(E::KIND);
        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| {
                let blocked = blocked_by(item);
                async move {
                    let key = item.display_key();
                    let result = match blocked {
                        Some(parent) => Err(ItemError::BlockedByParent(parent)),
                        None => self.reconcile(collection, item).await,
                    };
                    match &result {
                        Ok(outcome) => debug!(kind = %E::KIND, %key, ?outcome, "reconciled"),
                        Err(error) => warn!(kind = %E::KIND, %key, %error, "item failed"),
                    }
                    ItemOutcome {
                        kind: E::KIND,
                        key,
                        result,
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = outcomes.iter().filter(|outcome| outcome.is_failed()).count();
        info!(
            kind = %E::KIND,
            total = outcomes.len(),
            failed,
            "phase complete"
        );
        outcomes
    }

    /// Lookup by natural key, then insert or overwrite.
    async fn reconcile<E: SyncEntity>(&self, collection: &str, item: &E) -> Result<Outcome, ItemError> {
        let body = item.to_body().map_err(ItemError::Write)?;
        match self.store.lookup(collection, &item.natural_key()).await {
            Lookup::NotFound => {
                self.store
                    .insert(collection, &body)
                    .await
                    .map_err(ItemError::Write)?;
                Ok(Outcome::Created)
            }
            Lookup::Found(row) => {
                let handle = row.handle(E::HANDLE_FIELDS).map_err(ItemError::Write)?;
                self.store
                    .update(collection, &handle, &body)
                    .await
                    .map_err(ItemError::Write)?;
                Ok(Outcome::Updated)
            }
            Lookup::Failed(error) => Err(ItemError::Lookup(error)),
        }
    }
}
