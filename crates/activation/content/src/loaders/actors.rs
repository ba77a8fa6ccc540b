//! Actor catalog loader.

use std::collections::HashMap;
use std::path::Path;

use activation_core::{ActorSheet, EntityRef};
use anyhow::Context;

use super::{LoadResult, read_file};

/// Registry of actor sheets keyed by uuid.
#[derive(Debug, Clone, Default)]
pub struct ActorCatalog {
    actors: HashMap<EntityRef, ActorSheet>,
}

impl ActorCatalog {
    /// Loads the embedded sample actors.
    pub fn embedded() -> LoadResult<Self> {
        Self::from_ron(include_str!("../../data/actors.ron")).context("embedded actors.ron")
    }

    /// Loads actors from a RON file.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        Self::from_ron(&read_file(path)?)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_ron(source: &str) -> LoadResult<Self> {
        let sheets: Vec<ActorSheet> = ron::from_str(source)?;
        Ok(Self::from_sheets(sheets))
    }

    pub fn from_sheets(sheets: impl IntoIterator<Item = ActorSheet>) -> Self {
        let actors = sheets
            .into_iter()
            .map(|sheet| (sheet.uuid.clone(), sheet))
            .collect();
        Self { actors }
    }

    pub fn insert(&mut self, sheet: ActorSheet) {
        self.actors.insert(sheet.uuid.clone(), sheet);
    }

    pub fn get(&self, uuid: &EntityRef) -> Option<&ActorSheet> {
        self.actors.get(uuid)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}
