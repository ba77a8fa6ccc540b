//! Content loaders for reading catalog data.
//!
//! Embedded data is compiled into the crate; `from_path` variants read the
//! same format from disk.

pub mod actions;
pub mod actors;

pub use actions::{ActionCatalog, CatalogAction};
pub use actors::ActorCatalog;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}

/// Actions and actors loaded together.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub actions: ActionCatalog,
    pub actors: ActorCatalog,
}

impl Catalog {
    /// Loads the embedded sample catalog.
    pub fn embedded() -> LoadResult<Self> {
        Ok(Self {
            actions: ActionCatalog::embedded()?,
            actors: ActorCatalog::embedded()?,
        })
    }
}
