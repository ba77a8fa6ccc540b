//! Logical mutations of an activation record.
//!
//! A [`Mutation`] is the unit of intent shipped between clients: the author
//! applies it directly, everyone else forwards it to the GM. Application is
//! deterministic and enforces the record invariants:
//!
//! - saves are append-only and unique per actor
//! - created effects are append-only and unique per uuid
//! - transient effects are always also created effects
//! - effective targets stay a subset of targets once targets are set

use serde::{Deserialize, Serialize};

use super::{ActivationRecord, AttackData, AttackOutcome, ConfigMap, DamagePart, SaveEntry};
use crate::ids::EntityRef;
use crate::step::StateName;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Mutation {
    /// Moves to a new state (`None` = terminal).
    SetState { state: Option<StateName> },

    /// Pops the next flow step and makes it the current state; clears the
    /// state when the queue is empty.
    AdvanceFlow,

    /// Replaces the target set, pruning effective targets not in it.
    SetTargets { targets: Vec<EntityRef> },

    /// Replaces the effective target set.
    SetEffectiveTargets { targets: Vec<EntityRef> },

    SetTargetsConfirmed { confirmed: bool },

    /// Shallow-merges keys into the free-form configuration.
    MergeConfig { config: ConfigMap },

    SetAttack { attack: AttackData },

    SetAttackResult { result: AttackOutcome },

    SetDamage { parts: Vec<DamagePart> },

    /// Appends a save unless the actor already has one.
    AddSave { save: SaveEntry },

    /// Appends created effects not yet recorded.
    AddCreatedEffects { effects: Vec<EntityRef> },

    /// Appends created effects that terminal cleanup removes again.
    AddTransientEffects { effects: Vec<EntityRef> },

    /// Forgets transient effects once they have been removed.
    ClearTransientEffects,

    SetMasterEffect { effect: EntityRef },

    SetTemplate { template: EntityRef },

    /// Marks terminal cleanup as done.
    Finalize,
}

impl Mutation {
    pub fn state(state: impl Into<StateName>) -> Self {
        Mutation::SetState {
            state: Some(state.into()),
        }
    }

    pub fn terminal() -> Self {
        Mutation::SetState { state: None }
    }

    /// Returns true if this mutation changes the replicated state name.
    pub fn moves_state(&self) -> bool {
        matches!(self, Mutation::SetState { .. } | Mutation::AdvanceFlow)
    }
}

impl ActivationRecord {
    /// Applies one mutation; returns true if the record changed.
    pub fn apply(&mut self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::SetState { state } => replace(&mut self.state, state.clone()),

            Mutation::AdvanceFlow => {
                if self.flow_steps.is_empty() {
                    replace(&mut self.state, None)
                } else {
                    let next = self.flow_steps.remove(0);
                    self.state = Some(StateName::from(next));
                    true
                }
            }

            Mutation::SetTargets { targets } => {
                let targets = dedup(targets);
                let mut changed = replace(&mut self.target_uuids, targets);
                if !self.target_uuids.is_empty() {
                    let before = self.effective_target_uuids.len();
                    let allowed = &self.target_uuids;
                    self.effective_target_uuids
                        .retain(|target| allowed.contains(target));
                    changed |= before != self.effective_target_uuids.len();
                }
                changed
            }

            Mutation::SetEffectiveTargets { targets } => {
                let mut targets = dedup(targets);
                if !self.target_uuids.is_empty() {
                    targets.retain(|target| self.target_uuids.contains(target));
                }
                replace(&mut self.effective_target_uuids, targets)
            }

            Mutation::SetTargetsConfirmed { confirmed } => {
                replace(&mut self.targets_confirmed, *confirmed)
            }

            Mutation::MergeConfig { config } => {
                let mut changed = false;
                for (key, value) in config {
                    if self.config.get(key) != Some(value) {
                        self.config.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
                changed
            }

            Mutation::SetAttack { attack } => replace(&mut self.attack, Some(attack.clone())),

            Mutation::SetAttackResult { result } => match self.attack.as_mut() {
                Some(attack) => replace(&mut attack.result, Some(*result)),
                None => false,
            },

            Mutation::SetDamage { parts } => replace(&mut self.damage, Some(parts.clone())),

            Mutation::AddSave { save } => {
                if self.save_for(&save.actor).is_some() {
                    false
                } else {
                    self.saves.push(save.clone());
                    true
                }
            }

            Mutation::AddCreatedEffects { effects } => {
                append_unique(&mut self.created_effect_uuids, effects)
            }

            Mutation::AddTransientEffects { effects } => {
                let created = append_unique(&mut self.created_effect_uuids, effects);
                append_unique(&mut self.transient_effect_uuids, effects) || created
            }

            Mutation::ClearTransientEffects => {
                let changed = !self.transient_effect_uuids.is_empty();
                self.transient_effect_uuids.clear();
                changed
            }

            Mutation::SetMasterEffect { effect } => {
                replace(&mut self.master_effect_uuid, Some(effect.clone()))
            }

            Mutation::SetTemplate { template } => {
                replace(&mut self.template_uuid, Some(template.clone()))
            }

            Mutation::Finalize => replace(&mut self.finalized, true),
        }
    }
}

fn append_unique(list: &mut Vec<EntityRef>, effects: &[EntityRef]) -> bool {
    let mut changed = false;
    for effect in effects {
        if !list.contains(effect) {
            list.push(effect.clone());
            changed = true;
        }
    }
    changed
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn dedup(refs: &[EntityRef]) -> Vec<EntityRef> {
    let mut out: Vec<EntityRef> = Vec::with_capacity(refs.len());
    for entity in refs {
        if !out.contains(entity) {
            out.push(entity.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ApplicationType;
    use crate::record::RollResult;
    use crate::step::Step;

    fn record(steps: &[&str]) -> ActivationRecord {
        ActivationRecord::new(
            "item".into(),
            "actor".into(),
            ApplicationType::Immediate,
            steps.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn save(actor: &str, total: i32) -> Mutation {
        Mutation::AddSave {
            save: SaveEntry {
                actor: actor.into(),
                roll: RollResult::new("1d20+2", total),
            },
        }
    }

    #[test]
    fn advance_flow_drains_queue_in_order_then_terminates() {
        let mut record = record(&["applySelectedTargets", "applyEffects"]);

        assert!(record.apply(&Mutation::AdvanceFlow));
        assert_eq!(record.state, Some(Step::ApplySelectedTargets.into()));
        record.apply(&Mutation::state(Step::Idle));

        assert!(record.apply(&Mutation::AdvanceFlow));
        assert_eq!(record.state, Some(Step::ApplyEffects.into()));
        record.apply(&Mutation::state(Step::Idle));

        assert!(record.apply(&Mutation::AdvanceFlow));
        assert!(record.is_terminal());
        assert!(record.flow_steps.is_empty());
    }

    #[test]
    fn second_save_for_same_actor_is_ignored() {
        let mut record = record(&[]);
        assert!(record.apply(&save("goblin", 12)));
        assert!(!record.apply(&save("goblin", 19)));
        assert!(record.apply(&save("orc", 4)));

        assert_eq!(record.saves.len(), 2);
        assert_eq!(record.save_for(&"goblin".into()).unwrap().roll.total, 12);
    }

    #[test]
    fn effective_targets_are_filtered_against_targets() {
        let mut record = record(&[]);
        record.apply(&Mutation::SetTargets {
            targets: vec!["a".into(), "b".into()],
        });
        record.apply(&Mutation::SetEffectiveTargets {
            targets: vec!["b".into(), "z".into()],
        });

        assert_eq!(record.effective_target_uuids, vec![EntityRef::from("b")]);
        assert!(record.effective_targets_consistent());
    }

    #[test]
    fn replacing_targets_prunes_effective_targets() {
        let mut record = record(&[]);
        record.apply(&Mutation::SetEffectiveTargets {
            targets: vec!["a".into(), "b".into()],
        });
        record.apply(&Mutation::SetTargets {
            targets: vec!["a".into()],
        });

        assert_eq!(record.effective_target_uuids, vec![EntityRef::from("a")]);
        assert!(record.effective_targets_consistent());
    }

    #[test]
    fn created_effects_are_deduplicated() {
        let mut record = record(&[]);
        let effects = vec![EntityRef::from("fx-1"), EntityRef::from("fx-1")];
        assert!(record.apply(&Mutation::AddCreatedEffects { effects }));
        assert!(!record.apply(&Mutation::AddCreatedEffects {
            effects: vec!["fx-1".into()],
        }));
        assert_eq!(record.created_effect_uuids.len(), 1);
    }

    #[test]
    fn transient_effects_count_as_created_until_cleared() {
        let mut record = record(&[]);
        record.apply(&Mutation::AddCreatedEffects {
            effects: vec!["fx-lasting".into()],
        });
        assert!(record.apply(&Mutation::AddTransientEffects {
            effects: vec!["fx-immunity".into()],
        }));
        assert!(!record.apply(&Mutation::AddTransientEffects {
            effects: vec!["fx-immunity".into()],
        }));
        assert_eq!(record.created_effect_uuids.len(), 2);
        assert_eq!(record.transient_effect_uuids, vec![EntityRef::from("fx-immunity")]);

        assert!(record.apply(&Mutation::ClearTransientEffects));
        assert!(!record.apply(&Mutation::ClearTransientEffects));
        assert!(record.transient_effect_uuids.is_empty());
        assert_eq!(record.created_effect_uuids.len(), 2);
    }

    #[test]
    fn attack_result_needs_an_attack() {
        let mut record = record(&[]);
        assert!(!record.apply(&Mutation::SetAttackResult {
            result: AttackOutcome::Hit,
        }));
    }

    #[test]
    fn mutations_serialize_with_op_tag() {
        let json = serde_json::to_value(Mutation::AdvanceFlow).unwrap();
        assert_eq!(json["op"], "advanceFlow");
    }
}
