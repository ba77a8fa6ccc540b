//! Per-phase branches of an action.

use serde::{Deserialize, Serialize};

/// Which sub-branch of an action's effects and damage applies.
///
/// Fresh user actions resolve the `Immediate` branch. Activations triggered
/// later by a persistent master effect resolve `Delayed` (one-off follow-up)
/// or `Overtime` (recurring, e.g. at turn start).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ApplicationType {
    #[default]
    Immediate,
    Delayed,
    Overtime,
}

impl ApplicationType {
    /// Returns true for activations created by a trigger rather than a user.
    pub const fn is_triggered(self) -> bool {
        !matches!(self, ApplicationType::Immediate)
    }
}

/// One typed damage component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamagePartSpec {
    pub formula: String,
    pub damage_type: String,
}

/// Saving throw required by a phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSpec {
    pub ability: String,
    pub dc: i32,
    /// Targets that succeed still take half damage.
    #[serde(default)]
    pub half_on_save: bool,
}

/// Effect applied to targets by a phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpec {
    pub name: String,
    /// Duration in rounds; effects with a duration become master effects.
    #[serde(default)]
    pub duration_rounds: Option<u32>,
}

/// Damage, save and effects applied by one [`ApplicationType`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhaseProfile {
    pub damage: Vec<DamagePartSpec>,
    pub save: Option<SaveSpec>,
    pub effects: Vec<EffectSpec>,
    /// Effects apply regardless of the saving throw outcome.
    pub unavoidable: bool,
}

impl PhaseProfile {
    pub fn has_damage(&self) -> bool {
        !self.damage.is_empty()
    }

    pub fn has_save(&self) -> bool {
        self.save.is_some()
    }

    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }

    pub fn save_dc(&self) -> Option<i32> {
        self.save.as_ref().map(|save| save.dc)
    }

    pub fn halves_on_save(&self) -> bool {
        self.save.as_ref().is_some_and(|save| save.half_on_save)
    }

    /// Returns true if nothing in this phase depends on targets at all.
    pub fn is_empty(&self) -> bool {
        !self.has_damage() && !self.has_save() && !self.has_effects()
    }
}
