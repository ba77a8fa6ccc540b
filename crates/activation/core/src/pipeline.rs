//! The default activation pipeline.
//!
//! The pipeline is written once in the flow DSL and compiled per activation
//! against the action's static properties. The compiled list is stored in the
//! record as plain data and is never recomputed mid-resolution; triggered
//! follow-up activations compile their own list with their own
//! [`ApplicationType`].

use std::sync::LazyLock;

use activation_flow::builder::{op, pick, sequence, tokens, when};
use activation_flow::{FlowExpr, compile};

use crate::action::{ActionProfile, ApplicationType, PhaseProfile};
use crate::step::Step;

/// Static properties the pipeline predicates read.
#[derive(Clone, Debug)]
pub struct FlowContext {
    pub profile: ActionProfile,
    pub application: ApplicationType,
    pub phase: PhaseProfile,
}

impl FlowContext {
    pub fn new(profile: &ActionProfile, application: ApplicationType) -> Self {
        Self {
            profile: profile.clone(),
            application,
            phase: profile.phase(application),
        }
    }

    // ===== predicates =====

    /// Attacks only happen when a user starts the action.
    pub fn is_attack(&self) -> bool {
        self.profile.is_attack() && !self.application.is_triggered()
    }

    pub fn has_damage(&self) -> bool {
        self.phase.has_damage()
    }

    pub fn has_save(&self) -> bool {
        self.phase.has_save()
    }

    /// Triggered activations reuse the trigger's targets instead of placing a
    /// new template.
    pub fn has_area_target(&self) -> bool {
        self.profile.area_target && !self.application.is_triggered()
    }

    pub fn has_effects(&self) -> bool {
        self.phase.has_effects() || !self.profile.custom_steps.is_empty()
    }
}

fn step(step: Step, children: Vec<FlowExpr<FlowContext>>) -> FlowExpr<FlowContext> {
    op(step.as_ref(), children)
}

fn targeting() -> FlowExpr<FlowContext> {
    pick(vec![
        when("has_area_target", FlowContext::has_area_target, vec![step(
            Step::PlaceTemplate,
            vec![],
        )]),
        step(Step::ApplySelectedTargets, vec![]),
    ])
}

fn custom_steps() -> FlowExpr<FlowContext> {
    tokens(|ctx: &FlowContext| ctx.profile.custom_steps.clone())
}

fn apply_effects() -> FlowExpr<FlowContext> {
    step(Step::ApplyEffects, vec![])
}

fn build_pipeline() -> FlowExpr<FlowContext> {
    pick(vec![
        when("is_attack", FlowContext::is_attack, vec![step(
            Step::ApplySelectedTargets,
            vec![step(Step::PerformAttackRoll, vec![
                when("has_damage", FlowContext::has_damage, vec![step(
                    Step::PerformAttackDamageRoll,
                    vec![step(Step::ApplyDamage, vec![])],
                )]),
                custom_steps(),
                apply_effects(),
            ])],
        )]),
        when("has_save", FlowContext::has_save, vec![sequence(vec![
            targeting(),
            when("has_damage", FlowContext::has_damage, vec![step(
                Step::PerformDamageRoll,
                vec![],
            )]),
            step(Step::PerformSavingThrow, vec![]),
            when("has_damage", FlowContext::has_damage, vec![step(
                Step::ApplyDamage,
                vec![],
            )]),
            custom_steps(),
            apply_effects(),
        ])]),
        when("has_damage", FlowContext::has_damage, vec![sequence(vec![
            targeting(),
            step(Step::PerformDamageRoll, vec![step(Step::ApplyDamage, vec![])]),
            custom_steps(),
            apply_effects(),
        ])]),
        when("has_effects", FlowContext::has_effects, vec![sequence(vec![
            targeting(),
            custom_steps(),
            apply_effects(),
        ])]),
    ])
}

static DEFAULT_PIPELINE: LazyLock<FlowExpr<FlowContext>> = LazyLock::new(build_pipeline);

/// Returns the shared default pipeline.
pub fn default_pipeline() -> &'static FlowExpr<FlowContext> {
    &DEFAULT_PIPELINE
}

/// Compiles the flow steps for an action resolved as `application`.
pub fn compile_flow(profile: &ActionProfile, application: ApplicationType) -> Vec<String> {
    compile(default_pipeline(), &FlowContext::new(profile, application))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{AttackSpec, DamagePartSpec, EffectSpec, SaveSpec};

    fn damage() -> Vec<DamagePartSpec> {
        vec![DamagePartSpec {
            formula: "1d8+3".into(),
            damage_type: "slashing".into(),
        }]
    }

    fn save(dc: i32) -> Option<SaveSpec> {
        Some(SaveSpec {
            ability: "dex".into(),
            dc,
            half_on_save: true,
        })
    }

    #[test]
    fn attack_with_damage() {
        let profile = ActionProfile {
            attack: Some(AttackSpec { bonus: 5 }),
            immediate: PhaseProfile {
                damage: damage(),
                ..PhaseProfile::default()
            },
            ..ActionProfile::default()
        };

        assert_eq!(compile_flow(&profile, ApplicationType::Immediate), vec![
            "applySelectedTargets",
            "performAttackRoll",
            "performAttackDamageRoll",
            "applyDamage",
            "applyEffects",
        ]);
    }

    #[test]
    fn area_save_with_damage() {
        let profile = ActionProfile {
            area_target: true,
            immediate: PhaseProfile {
                damage: damage(),
                save: save(15),
                ..PhaseProfile::default()
            },
            ..ActionProfile::default()
        };

        assert_eq!(compile_flow(&profile, ApplicationType::Immediate), vec![
            "placeTemplate",
            "performDamageRoll",
            "performSavingThrow",
            "applyDamage",
            "applyEffects",
        ]);
    }

    #[test]
    fn damage_only_action() {
        let profile = ActionProfile {
            immediate: PhaseProfile {
                damage: damage(),
                ..PhaseProfile::default()
            },
            ..ActionProfile::default()
        };

        assert_eq!(compile_flow(&profile, ApplicationType::Immediate), vec![
            "applySelectedTargets",
            "performDamageRoll",
            "applyDamage",
            "applyEffects",
        ]);
    }

    #[test]
    fn effects_only_action_falls_back_to_apply_effects() {
        let profile = ActionProfile {
            immediate: PhaseProfile {
                effects: vec![EffectSpec {
                    name: "Blessed".into(),
                    duration_rounds: Some(10),
                }],
                ..PhaseProfile::default()
            },
            ..ActionProfile::default()
        };

        assert_eq!(compile_flow(&profile, ApplicationType::Immediate), vec![
            "applySelectedTargets",
            "applyEffects",
        ]);
    }

    #[test]
    fn nothing_qualifies_compiles_to_empty_flow() {
        assert!(compile_flow(&ActionProfile::default(), ApplicationType::Immediate).is_empty());
    }

    #[test]
    fn overtime_phase_skips_attack_and_template() {
        let profile = ActionProfile {
            attack: Some(AttackSpec { bonus: 5 }),
            area_target: true,
            overtime: Some(PhaseProfile {
                save: save(13),
                ..PhaseProfile::default()
            }),
            ..ActionProfile::default()
        };

        assert_eq!(compile_flow(&profile, ApplicationType::Overtime), vec![
            "applySelectedTargets",
            "performSavingThrow",
            "applyEffects",
        ]);
    }

    #[test]
    fn custom_steps_run_before_effects() {
        let profile = ActionProfile {
            attack: Some(AttackSpec { bonus: 2 }),
            custom_steps: vec!["summonSpiritualWeapon".into()],
            ..ActionProfile::default()
        };

        assert_eq!(compile_flow(&profile, ApplicationType::Immediate), vec![
            "applySelectedTargets",
            "performAttackRoll",
            "summonSpiritualWeapon",
            "applyEffects",
        ]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let profile = ActionProfile {
            immediate: PhaseProfile {
                damage: damage(),
                save: save(12),
                ..PhaseProfile::default()
            },
            ..ActionProfile::default()
        };
        assert_eq!(
            compile_flow(&profile, ApplicationType::Immediate),
            compile_flow(&profile, ApplicationType::Immediate)
        );
    }
}
