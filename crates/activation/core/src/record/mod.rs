//! The replicated activation record.
//!
//! [`ActivationRecord`] is plain data: it is serialized into the payload of
//! the backing message and every client decodes its own copy. All changes go
//! through [`Mutation`] so that the same logical intent can be applied
//! locally or forwarded to the authoritative client unchanged.

mod mutation;
mod types;

pub use mutation::Mutation;
pub use types::{AttackData, AttackOutcome, ConfigMap, DamagePart, RollResult, SaveEntry};

use serde::{Deserialize, Serialize};

use crate::action::ApplicationType;
use crate::ids::EntityRef;
use crate::step::StateName;

/// One in-progress resolution of a single game action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRecord {
    pub item_ref: EntityRef,
    pub actor_ref: EntityRef,
    #[serde(default)]
    pub application_type: ApplicationType,

    /// Current state; `None` is terminal.
    #[serde(default)]
    pub state: Option<StateName>,

    /// Pending flow steps, consumed from the front.
    #[serde(default)]
    pub flow_steps: Vec<String>,

    #[serde(default)]
    pub config: ConfigMap,

    #[serde(default)]
    pub target_uuids: Vec<EntityRef>,
    #[serde(default)]
    pub effective_target_uuids: Vec<EntityRef>,
    #[serde(default)]
    pub targets_confirmed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<AttackData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<Vec<DamagePart>>,
    #[serde(default)]
    pub saves: Vec<SaveEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_effect_uuid: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_effect_uuid: Option<EntityRef>,

    #[serde(default)]
    pub created_effect_uuids: Vec<EntityRef>,
    /// Created effects that only live as long as the activation.
    #[serde(default)]
    pub transient_effect_uuids: Vec<EntityRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_uuid: Option<EntityRef>,

    /// Terminal cleanup already ran.
    #[serde(default)]
    pub finalized: bool,
}

impl ActivationRecord {
    /// Creates a record parked in `idle` with the compiled flow.
    pub fn new(
        item_ref: EntityRef,
        actor_ref: EntityRef,
        application_type: ApplicationType,
        flow_steps: Vec<String>,
    ) -> Self {
        Self {
            item_ref,
            actor_ref,
            application_type,
            state: Some(StateName::IDLE),
            flow_steps,
            ..Self::default()
        }
    }

    /// Returns true once resolution is over.
    pub fn is_terminal(&self) -> bool {
        self.state.is_none()
    }

    /// Returns true if this activation was started by a persistent effect.
    pub fn is_triggered(&self) -> bool {
        self.condition.is_some() || self.source_effect_uuid.is_some()
    }

    pub fn save_for(&self, actor: &EntityRef) -> Option<&SaveEntry> {
        self.saves.iter().find(|save| &save.actor == actor)
    }

    /// Targets that have not rolled their save yet.
    pub fn missing_saves(&self) -> Vec<EntityRef> {
        self.target_uuids
            .iter()
            .filter(|target| self.save_for(target).is_none())
            .cloned()
            .collect()
    }

    /// Returns true when every target has a recorded save.
    pub fn all_saves_recorded(&self) -> bool {
        self.target_uuids
            .iter()
            .all(|target| self.save_for(target).is_some())
    }

    /// Targets that were selected but are not affected.
    pub fn unaffected_targets(&self) -> Vec<EntityRef> {
        self.target_uuids
            .iter()
            .filter(|target| !self.effective_target_uuids.contains(target))
            .cloned()
            .collect()
    }

    /// Checks `effective ⊆ targets` whenever both are populated.
    pub fn effective_targets_consistent(&self) -> bool {
        self.target_uuids.is_empty()
            || self
                .effective_target_uuids
                .iter()
                .all(|target| self.target_uuids.contains(target))
    }

    /// Applies every mutation in order; returns true if anything changed.
    pub fn apply_all<'a>(&mut self, mutations: impl IntoIterator<Item = &'a Mutation>) -> bool {
        let mut changed = false;
        for mutation in mutations {
            changed |= self.apply(mutation);
        }
        changed
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, crate::RecordError> {
        serde_json::to_value(self).map_err(crate::RecordError::Encode)
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, crate::RecordError> {
        Self::deserialize(payload).map_err(crate::RecordError::Decode)
    }
}
