//! Sub-records stored inside an [`super::ActivationRecord`].

use serde::{Deserialize, Serialize};

use crate::ids::EntityRef;

/// Free-form configuration merged in by prompts during resolution.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Result of a single dice evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollResult {
    pub formula: String,
    pub total: i32,
    /// Value of the kept d20, for rolls that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural: Option<i32>,
}

impl RollResult {
    pub fn new(formula: impl Into<String>, total: i32) -> Self {
        Self {
            formula: formula.into(),
            total,
            natural: None,
        }
    }

    pub fn with_natural(mut self, natural: i32) -> Self {
        self.natural = Some(natural);
        self
    }
}

/// Recorded outcome of an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackOutcome {
    Hit,
    Miss,
}

/// Attack roll and its outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackData {
    pub target: EntityRef,
    pub roll: RollResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AttackOutcome>,
    /// Options the roll was made with (advantage, bonuses).
    #[serde(default)]
    pub options: ConfigMap,
}

/// One rolled, typed damage component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamagePart {
    pub formula: String,
    pub total: i32,
    pub damage_type: String,
}

/// A saving throw made by one actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveEntry {
    pub actor: EntityRef,
    pub roll: RollResult,
}
