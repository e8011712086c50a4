//! Repository configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! catch_up = "synchronous"
//!
//! [event_store]
//! kind = "sqlite"
//! path = "var/events.db"
//!
//! [[dimensions]]
//! id = "language"
//! values = [
//!     { value = "mul" },
//!     { value = "de", fallback = "mul" },
//! ]
//! ```
//!
//! Logging is configured separately through `RUST_LOG`.

use contentgraph_core::dimension::{
    ContentDimensionSource, DimensionConfig, DimensionDefinition, InterDimensionalVariationGraph,
};
use contentgraph_core::errors::{CgError, CgErrorKind};
use contentgraph_store::{EventStore, InMemoryEventStore, Result, SqliteEventStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// When projections are brought up to date after a commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatchUpMode {
    /// Inside `ContentRepository::handle`, before it returns
    #[default]
    Synchronous,
    /// By an explicit `catch_up` call or a background worker
    Deferred,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventStoreConfig {
    #[default]
    Memory,
    Sqlite { path: PathBuf },
}

impl EventStoreConfig {
    /// Open the configured store
    ///
    /// # Errors
    ///
    /// `Persistence` when the SQLite file cannot be opened or migrated.
    pub fn open(&self) -> Result<Arc<dyn EventStore>> {
        match self {
            EventStoreConfig::Memory => Ok(Arc::new(InMemoryEventStore::new())),
            EventStoreConfig::Sqlite { path } => Ok(Arc::new(SqliteEventStore::open(path)?)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Dimensions in priority order
    #[serde(default)]
    pub dimensions: Vec<DimensionDefinition>,
    #[serde(default)]
    pub event_store: EventStoreConfig,
    #[serde(default)]
    pub catch_up: CatchUpMode,
}

impl RepositoryConfig {
    /// # Errors
    ///
    /// `InvalidConfiguration` for malformed TOML.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| {
            CgError::new(CgErrorKind::InvalidConfiguration)
                .with_op("load_config")
                .with_message(e.to_string())
        })
    }

    /// # Errors
    ///
    /// `Io` when the file cannot be read, `InvalidConfiguration` when it
    /// does not parse.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CgError::new(CgErrorKind::Io)
                .with_op("load_config")
                .with_entity_id(path.display().to_string())
                .with_message(e.to_string())
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn dimension_config(&self) -> DimensionConfig {
        DimensionConfig {
            dimensions: self.dimensions.clone(),
        }
    }

    /// Validate the dimensions and build the variation graph
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for duplicate values, unknown or cyclic
    /// fallbacks and similar mistakes.
    pub fn variation_graph(&self) -> Result<InterDimensionalVariationGraph> {
        let source = ContentDimensionSource::try_from(self.dimension_config())?;
        Ok(InterDimensionalVariationGraph::new(source)?)
    }
}
