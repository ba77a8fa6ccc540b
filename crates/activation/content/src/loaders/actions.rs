//! Action catalog loader.

use std::collections::HashMap;
use std::path::Path;

use activation_core::{ActionProfile, EntityRef};
use anyhow::Context;
use serde::Deserialize;

use super::{LoadResult, read_file};

/// One catalog entry: an item uuid and the action it performs.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogAction {
    pub uuid: EntityRef,
    pub profile: ActionProfile,
}

/// Registry of action profiles keyed by item uuid.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    profiles: HashMap<EntityRef, ActionProfile>,
}

impl ActionCatalog {
    /// Loads the embedded sample actions.
    pub fn embedded() -> LoadResult<Self> {
        Self::from_ron(include_str!("../../data/actions.ron")).context("embedded actions.ron")
    }

    /// Loads actions from a RON file.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        Self::from_ron(&read_file(path)?)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_ron(source: &str) -> LoadResult<Self> {
        let entries: Vec<CatalogAction> = ron::from_str(source)?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogAction>) -> Self {
        let profiles = entries
            .into_iter()
            .map(|entry| (entry.uuid, entry.profile))
            .collect();
        Self { profiles }
    }

    pub fn insert(&mut self, uuid: EntityRef, profile: ActionProfile) {
        self.profiles.insert(uuid, profile);
    }

    pub fn get(&self, uuid: &EntityRef) -> Option<&ActionProfile> {
        self.profiles.get(uuid)
    }

    pub fn remove(&mut self, uuid: &EntityRef) -> Option<ActionProfile> {
        self.profiles.remove(uuid)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activation_core::{ApplicationType, compile_flow};

    #[test]
    fn embedded_actions_load() {
        let catalog = ActionCatalog::embedded().expect("Failed to load actions");
        assert!(catalog.len() >= 5);

        let longsword = catalog.get(&"Item.longsword".into()).unwrap();
        assert_eq!(longsword.attack_bonus(), 5);
        assert!(longsword.immediate.has_damage());

        let fireball = catalog.get(&"Item.fireball".into()).unwrap();
        assert!(fireball.area_target);
        assert!(fireball.immediate.halves_on_save());
        assert_eq!(fireball.immediate.save_dc(), Some(15));
    }

    #[test]
    fn hold_person_has_an_overtime_flow() {
        let catalog = ActionCatalog::embedded().unwrap();
        let hold = catalog.get(&"Item.hold-person".into()).unwrap();

        assert_eq!(compile_flow(hold, ApplicationType::Overtime), vec![
            "applySelectedTargets",
            "performSavingThrow",
            "applyEffects",
        ]);
        assert!(compile_flow(hold, ApplicationType::Delayed).is_empty());
    }

    #[test]
    fn malformed_source_is_an_error() {
        assert!(ActionCatalog::from_ron("[ (uuid: ").is_err());
    }
}
