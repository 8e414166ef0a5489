use std::fmt;

use serde::{Deserialize, Serialize};

/// Column names of the tabular export, in canonical order.
pub const COLUMNS: [&str; 6] = ["category", "subcategory", "title", "description", "url", "tags"];

/// Columns that must be present in the header for a source to be usable.
pub const REQUIRED_COLUMNS: [&str; 4] = ["category", "subcategory", "title", "url"];

/// One flattened resource record as read from the tabular export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    /// 1-based line (or sheet row) the record came from.
    pub line: usize,
    pub category: String,
    pub subcategory: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub tags: Vec<String>,
}

/// A row whose keys are canonical and whose display titles are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub row: Row,
    pub category_title: String,
    pub subcategory_title: String,
}

/// Top level of the hierarchy, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub description: String,
}

/// Second level, keyed by (`category_id`, `id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryRecord {
    pub id: String,
    pub category_id: String,
    pub title: String,
}

impl SubcategoryRecord {
    /// Natural key of the subcategory.
    pub fn key(&self) -> SubcategoryKey {
        (self.category_id.clone(), self.id.clone())
    }
}

/// Leaf resource, keyed globally by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub title: String,
    pub description: String,
    pub url: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub subcategory_id: String,
}

impl ResourceRecord {
    /// Natural key of the owning subcategory.
    pub fn parent_key(&self) -> SubcategoryKey {
        (self.category_id.clone(), self.subcategory_id.clone())
    }
}

/// (`category_id`, `subcategory_id`).
pub type SubcategoryKey = (String, String);

/// The three entity types the pipeline reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Subcategory,
    Resource,
}

impl EntityKind {
    /// All kinds in dependency order.
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Category,
        EntityKind::Subcategory,
        EntityKind::Resource,
    ];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Category => write!(f, "category"),
            EntityKind::Subcategory => write!(f, "subcategory"),
            EntityKind::Resource => write!(f, "resource"),
        }
    }
}

/// Hierarchical representation of a single category, as exported per
/// category by the catalog front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub subcategories: Vec<CatalogSubcategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSubcategory {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
