//! CLI configuration.
//!
//! Read from `ifcgraph.toml` (see [`paths::get_config_path`]). Every key is
//! optional and command-line flags override what the file says:
//!
//! ```toml
//! schema = "schemas/ifc4.toml"
//!
//! [projection]
//! include_hierarchy = true
//! history_type = "IfcOwnerHistory"
//! root_type = "IfcProject"
//! inverse_direction = "incoming"
//!
//! [store]
//! database = "/var/lib/ifcgraph/graph.db"
//! ```
//!
//! [`paths::get_config_path`]: crate::paths::get_config_path

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ifcgraph_graph::ProjectionConfig;
use ifcgraph_model::Schema;
use serde::Deserialize;

use crate::paths;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema file; the built-in IFC4 subset when unset.
    pub schema: Option<PathBuf>,
    pub projection: ProjectionConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Database path: `flag`, then `[store] database`, then the data directory.
    pub fn database_path(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.store.database.clone())
            .unwrap_or_else(paths::get_db_path)
    }

    /// Schema: `flag`, then `schema`, then the built-in subset.
    pub fn load_schema(&self, flag: Option<PathBuf>) -> Result<Schema> {
        match flag.or_else(|| self.schema.clone()) {
            Some(path) => Schema::load(&path)
                .with_context(|| format!("Failed to load schema: {}", path.display())),
            None => Schema::ifc_core().context("Built-in schema is invalid"),
        }
    }
}
