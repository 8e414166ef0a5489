//! Collapses flat rows into the distinct records each sync phase reconciles.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::{debug, warn};

use crate::bento::catalog::error::{InvalidRowError, PlanError};
use crate::bento::catalog::model::{
    CategoryRecord, EntityKind, NormalizedRow, ResourceRecord, Row, SubcategoryKey,
    SubcategoryRecord,
};
use crate::bento::catalog::normalize::normalize_rows;

/// Icon used for derived categories unless configured otherwise.
pub const DEFAULT_CATEGORY_ICON: &str = "folder";

/// Knobs for the synthetic parts of derived records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOptions {
    pub category_icon: String,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            category_icon: DEFAULT_CATEGORY_ICON.to_string(),
        }
    }
}

/// Insertion-ordered map keyed by natural key. The first insert for a key wins.
#[derive(Debug, Clone)]
pub struct KeyedRecords<K, V> {
    index: HashMap<K, usize>,
    values: Vec<V>,
}

impl<K, V> Default for KeyedRecords<K, V> {
    fn default() -> Self {
        Self {
            index: HashMap::new(),
            values: Vec::new(),
        }
    }
}

impl<K: Eq + Hash, V> KeyedRecords<K, V> {
    /// Inserts `make()` under `key` unless the key is already present.
    fn insert_with(&mut self, key: K, make: impl FnOnce() -> V) {
        if self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key, self.values.len());
        self.values.push(make());
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&position| &self.values[position])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[V] {
        &self.values
    }
}

/// Everything one run will reconcile, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub categories: KeyedRecords<String, CategoryRecord>,
    pub subcategories: KeyedRecords<SubcategoryKey, SubcategoryRecord>,
    pub resources: KeyedRecords<String, ResourceRecord>,
    /// Rows dropped before or during planning.
    pub rejections: Vec<InvalidRowError>,
    /// Number of rows read from the source, valid or not.
    pub input_rows: usize,
}

impl SyncPlan {
    /// Normalises `rows` and builds the plan from the accepted ones.
    pub fn from_rows<I>(rows: I, options: &PlanOptions) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = Row>,
    {
        let rows: Vec<Row> = rows.into_iter().collect();
        let input_rows = rows.len();
        let (accepted, rejections) = normalize_rows(rows);

        let mut plan = Self::build(accepted, options)?;
        plan.input_rows = input_rows;
        plan.rejections.extend(rejections);
        plan.rejections.sort_by_key(InvalidRowError::line);

        if input_rows > 0 && plan.categories.is_empty() {
            return Err(PlanError::NoCategories { rows: input_rows });
        }
        Ok(plan)
    }

    /// Builds the plan from rows that are already normalised.
    pub fn build(rows: Vec<NormalizedRow>, options: &PlanOptions) -> Result<Self, PlanError> {
        let mut plan = SyncPlan {
            input_rows: rows.len(),
            ..Self::default()
        };
        let mut first_lines: HashMap<String, usize> = HashMap::new();

        for normalized in rows {
            let NormalizedRow {
                row,
                category_title,
                subcategory_title,
            } = normalized;

            if let Some(&first_line) = first_lines.get(&row.url) {
                let rejection = InvalidRowError::DuplicateUrl {
                    line: row.line,
                    url: row.url,
                    first_line,
                };
                warn!(%rejection, "dropping duplicate resource");
                plan.rejections.push(rejection);
                continue;
            }
            first_lines.insert(row.url.clone(), row.line);

            plan.categories.insert_with(row.category.clone(), || CategoryRecord {
                id: row.category.clone(),
                description: format!("{category_title} resources"),
                title: category_title,
                icon: options.category_icon.clone(),
            });

            plan.subcategories.insert_with(
                (row.category.clone(), row.subcategory.clone()),
                || SubcategoryRecord {
                    id: row.subcategory.clone(),
                    category_id: row.category.clone(),
                    title: subcategory_title,
                },
            );

            plan.resources.insert_with(row.url.clone(), || ResourceRecord {
                title: row.title,
                description: row.description,
                url: row.url,
                tags: row.tags,
                category_id: row.category,
                subcategory_id: row.subcategory,
            });
        }

        plan.check_references()?;
        debug!(
            categories = plan.categories.len(),
            subcategories = plan.subcategories.len(),
            resources = plan.resources.len(),
            "plan built"
        );
        Ok(plan)
    }

    /// Verifies that every child points at a planned parent.
    pub fn check_references(&self) -> Result<(), PlanError> {
        for subcategory in self.subcategories.iter() {
            if !self.categories.contains(&subcategory.category_id) {
                return Err(PlanError::DanglingReference {
                    kind: EntityKind::Subcategory,
                    key: subcategory.id.clone(),
                    parent: subcategory.category_id.clone(),
                });
            }
        }
        for resource in self.resources.iter() {
            if !self.subcategories.contains(&resource.parent_key()) {
                return Err(PlanError::DanglingReference {
                    kind: EntityKind::Resource,
                    key: resource.url.clone(),
                    parent: format!("{}/{}", resource.category_id, resource.subcategory_id),
                });
            }
        }
        Ok(())
    }

    /// Number of planned items of the given kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Category => self.categories.len(),
            EntityKind::Subcategory => self.subcategories.len(),
            EntityKind::Resource => self.resources.len(),
        }
    }
}
