//! TOML configuration for the sync command.
//!
//! ```toml
//! [store]
//! base_url = "https://example.supabase.co/rest/v1"
//! api_key = "..."
//! timeout_secs = 30
//!
//! [store.collections]
//! resources = "resources"
//!
//! [sync]
//! concurrency = 8
//!
//! [catalog]
//! category_icon = "folder"
//! ```
//!
//! Every key is optional. Command-line flags and environment variables take
//! precedence over the file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bento::catalog::engine::DEFAULT_CONCURRENCY;
use crate::bento::catalog::error::{Result, SyncError};
use crate::bento::catalog::plan::{DEFAULT_CATEGORY_ICON, PlanOptions};
use crate::bento::catalog::store::Collections;
use crate::bento::catalog::store::rest::DEFAULT_TIMEOUT_SECS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub sync: SyncSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub collections: Collections,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            collections: Collections::default(),
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL, or a configuration error when none was provided.
    pub fn require_base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                SyncError::Config(
                    "store base URL is not set (use --base-url, BENTO_STORE_URL or [store].base_url)"
                        .into(),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    pub concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSettings {
    pub category_icon: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            category_icon: DEFAULT_CATEGORY_ICON.to_string(),
        }
    }
}

impl Config {
    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyncError::MissingInput(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|err| SyncError::Config(err.to_string()))
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            category_icon: self.catalog.category_icon.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").expect("parsed");
        assert_eq!(config, Config::default());
        assert_eq!(config.sync.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.store.timeout(), Duration::from_secs(30));
        assert_eq!(config.plan_options(), PlanOptions::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [store]
            base_url = "https://db.test/rest/v1"
            timeout_secs = 5

            [store.collections]
            resources = "links"

            [sync]
            concurrency = 2

            [catalog]
            category_icon = "star"
            "#,
        )
        .expect("parsed");

        assert_eq!(config.store.require_base_url().expect("url"), "https://db.test/rest/v1");
        assert_eq!(config.store.collections.resources, "links");
        assert_eq!(config.store.collections.categories, "categories");
        assert_eq!(config.sync.concurrency, 2);
        assert_eq!(config.plan_options().category_icon, "star");
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let error = Config::default().store.require_base_url().unwrap_err();
        assert!(matches!(error, SyncError::Config(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let error = Config::from_toml_str("[sync]\nworkers = 3\n").unwrap_err();
        assert!(matches!(error, SyncError::Config(_)));
    }
}
