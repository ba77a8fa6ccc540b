//! Actor data the resolver reads through the entity resolver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{EntityRef, UserId};

/// Read-only view of an actor involved in an activation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActorSheet {
    pub uuid: EntityRef,
    pub name: String,

    /// Player controlling this actor; `None` for GM-controlled actors.
    pub owner: Option<UserId>,

    pub armor_class: i32,

    /// Saving throw bonus per ability.
    pub save_bonuses: BTreeMap<String, i32>,
}

impl ActorSheet {
    pub fn is_gm_controlled(&self) -> bool {
        self.owner.is_none()
    }

    pub fn save_bonus(&self, ability: &str) -> i32 {
        self.save_bonuses.get(ability).copied().unwrap_or_default()
    }
}
