use serde::{Deserialize, Serialize};

use super::{ApplicationType, PhaseProfile};

/// Attack roll made by an action.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttackSpec {
    pub bonus: i32,
}

/// Static properties of an action, as loaded from its source item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionProfile {
    pub name: String,

    /// Present for actions that roll to hit a single target.
    pub attack: Option<AttackSpec>,

    /// Targets come from an area template rather than the user's selection.
    pub area_target: bool,

    /// The action has no lasting presence once resolved.
    pub instantaneous: bool,

    /// The source item is deleted after the action completes.
    pub consumes_item: bool,

    /// Targets that succeed on the save become immune to this item once.
    pub save_immunity: bool,

    /// Extension-provided steps run after damage and before effects.
    pub custom_steps: Vec<String>,

    pub immediate: PhaseProfile,
    pub delayed: Option<PhaseProfile>,
    pub overtime: Option<PhaseProfile>,
}

impl ActionProfile {
    /// Returns the phase profile for an application type.
    ///
    /// Missing delayed/overtime branches resolve to an empty phase, which
    /// compiles to an empty flow.
    pub fn phase(&self, application: ApplicationType) -> PhaseProfile {
        match application {
            ApplicationType::Immediate => self.immediate.clone(),
            ApplicationType::Delayed => self.delayed.clone().unwrap_or_default(),
            ApplicationType::Overtime => self.overtime.clone().unwrap_or_default(),
        }
    }

    pub fn is_attack(&self) -> bool {
        self.attack.is_some()
    }

    pub fn attack_bonus(&self) -> i32 {
        self.attack.as_ref().map(|attack| attack.bonus).unwrap_or_default()
    }

    /// Returns true when any later phase exists, meaning the immediate
    /// effects are expected to create a master effect that triggers it.
    pub fn has_followups(&self) -> bool {
        self.delayed.is_some() || self.overtime.is_some()
    }
}
