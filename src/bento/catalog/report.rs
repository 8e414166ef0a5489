//! Per-run outcome ledger.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::bento::catalog::error::{InvalidRowError, ItemError};
use crate::bento::catalog::model::EntityKind;

/// Successful result of reconciling one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
}

/// What happened to one planned item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub kind: EntityKind,
    pub key: String,
    pub result: Result<Outcome, ItemError>,
}

impl ItemOutcome {
    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }
}

/// Outcome counts for one entity kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub planned: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    /// Failures caused by a failed parent; included in `failed`.
    pub blocked: usize,
}

/// A `failed` item with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub kind: EntityKind,
    pub key: String,
    pub reason: &'static str,
    pub detail: String,
}

/// A source row that never reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub detail: String,
}

/// Aggregated result of one sync run. Partial failure is data, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub tallies: BTreeMap<EntityKind, Tally>,
    pub failures: Vec<FailureRecord>,
    pub rejected_rows: Vec<RejectedRow>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            tallies: EntityKind::ALL
                .into_iter()
                .map(|kind| (kind, Tally::default()))
                .collect(),
            failures: Vec::new(),
            rejected_rows: Vec::new(),
        }
    }

    /// Records rows dropped before planning finished.
    pub fn record_rejections(&mut self, rejections: &[InvalidRowError]) {
        self.rejected_rows
            .extend(rejections.iter().map(|rejection| RejectedRow {
                line: rejection.line(),
                detail: rejection.to_string(),
            }));
    }

    /// Folds the outcomes of one completed phase into the totals.
    pub fn record_phase(&mut self, kind: EntityKind, outcomes: &[ItemOutcome]) {
        let tally = self.tallies.entry(kind).or_default();
        tally.planned += outcomes.len();
        for outcome in outcomes {
            match &outcome.result {
                Ok(Outcome::Created) => tally.created += 1,
                Ok(Outcome::Updated) => tally.updated += 1,
                Err(error) => {
                    tally.failed += 1;
                    if matches!(error, ItemError::BlockedByParent(_)) {
                        tally.blocked += 1;
                    }
                    self.failures.push(FailureRecord {
                        kind: outcome.kind,
                        key: outcome.key.clone(),
                        reason: error.reason(),
                        detail: error.to_string(),
                    });
                }
            }
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn tally(&self, kind: EntityKind) -> Tally {
        self.tallies.get(&kind).copied().unwrap_or_default()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Failures for one entity kind.
    pub fn failures_for(&self, kind: EntityKind) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(move |failure| failure.kind == kind)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {}", self.run_id)?;
        writeln!(
            f,
            "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "entity", "planned", "created", "updated", "failed", "blocked"
        )?;
        for kind in EntityKind::ALL {
            let tally = self.tally(kind);
            writeln!(
                f,
                "{:<12} {:>8} {:>8} {:>8} {:>8} {:>8}",
                kind.to_string(),
                tally.planned,
                tally.created,
                tally.updated,
                tally.failed,
                tally.blocked
            )?;
        }

        if !self.rejected_rows.is_empty() {
            writeln!(f, "rejected rows: {}", self.rejected_rows.len())?;
            for row in &self.rejected_rows {
                writeln!(f, "  {}", row.detail)?;
            }
        }

        if !self.failures.is_empty() {
            writeln!(f, "failures: {}", self.failures.len())?;
            for failure in &self.failures {
                writeln!(f, "  {} {}: {}", failure.kind, failure.key, failure.detail)?;
            }
        }
        Ok(())
    }
}
