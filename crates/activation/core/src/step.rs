//! The state vocabulary of an activation.
//!
//! Every replicated `state` value is either one of the fixed [`Step`] names
//! or a custom name handled by an extension. Names are stored as plain
//! strings so that records stay readable by any client version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed state names understood by the resolver.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum Step {
    #[strum(serialize = "idle")]
    Idle,

    // ===== flow-popped steps =====
    #[strum(serialize = "applySelectedTargets")]
    ApplySelectedTargets,
    #[strum(serialize = "placeTemplate")]
    PlaceTemplate,
    #[strum(serialize = "performAttackRoll")]
    PerformAttackRoll,
    #[strum(serialize = "performAttackDamageRoll")]
    PerformAttackDamageRoll,
    #[strum(serialize = "performDamageRoll")]
    PerformDamageRoll,
    #[strum(serialize = "performSavingThrow")]
    PerformSavingThrow,
    #[strum(serialize = "applyDamage")]
    ApplyDamage,
    #[strum(serialize = "applyEffects")]
    ApplyEffects,

    // ===== branch states =====
    #[strum(serialize = "saves-completed")]
    SavesCompleted,

    // ===== wait states =====
    #[strum(serialize = "waiting-for-target-confirmation")]
    WaitingForTargetConfirmation,
    #[strum(serialize = "waiting-for-attack-result")]
    WaitingForAttackResult,
    #[strum(serialize = "waiting-for-attack-damage-roll")]
    WaitingForAttackDamageRoll,
    #[strum(serialize = "waiting-for-saves")]
    WaitingForSaves,
}

/// Broad classification of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepCategory {
    /// `idle`: pops the next flow step.
    Idle,
    /// Emitted by the flow compiler; runs a side effect, then returns to idle.
    Flow,
    /// Internal branch reached from another step.
    Branch,
    /// Parked until an external actor supplies missing data.
    Wait,
}

impl Step {
    pub const fn category(self) -> StepCategory {
        match self {
            Step::Idle => StepCategory::Idle,
            Step::ApplySelectedTargets
            | Step::PlaceTemplate
            | Step::PerformAttackRoll
            | Step::PerformAttackDamageRoll
            | Step::PerformDamageRoll
            | Step::PerformSavingThrow
            | Step::ApplyDamage
            | Step::ApplyEffects => StepCategory::Flow,
            Step::SavesCompleted => StepCategory::Branch,
            Step::WaitingForTargetConfirmation
            | Step::WaitingForAttackResult
            | Step::WaitingForAttackDamageRoll
            | Step::WaitingForSaves => StepCategory::Wait,
        }
    }

    pub const fn is_wait(self) -> bool {
        matches!(self.category(), StepCategory::Wait)
    }
}

/// A replicated state value: a fixed step or an extension-defined name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StateName {
    Known(Step),
    Custom(String),
}

impl StateName {
    pub const IDLE: StateName = StateName::Known(Step::Idle);

    pub fn as_str(&self) -> &str {
        match self {
            StateName::Known(step) => step.as_ref(),
            StateName::Custom(name) => name,
        }
    }

    pub fn step(&self) -> Option<Step> {
        match self {
            StateName::Known(step) => Some(*step),
            StateName::Custom(_) => None,
        }
    }

    pub fn is(&self, step: Step) -> bool {
        self.step() == Some(step)
    }
}

impl From<Step> for StateName {
    fn from(step: Step) -> Self {
        StateName::Known(step)
    }
}

impl From<&str> for StateName {
    fn from(name: &str) -> Self {
        match Step::from_str(name) {
            Ok(step) => StateName::Known(step),
            Err(_) => StateName::Custom(name.to_owned()),
        }
    }
}

impl From<String> for StateName {
    fn from(name: String) -> Self {
        match Step::from_str(&name) {
            Ok(step) => StateName::Known(step),
            Err(_) => StateName::Custom(name),
        }
    }
}

impl From<StateName> for String {
    fn from(state: StateName) -> Self {
        match state {
            StateName::Known(step) => step.to_string(),
            StateName::Custom(name) => name,
        }
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
