//! Requests and results exchanged with external services.

use serde::{Deserialize, Serialize};

use activation_core::{
    ApplicationType, ConfigMap, DamagePart, DamagePartSpec, EffectSpec, EntityRef,
};

/// Which roll a prompt is gathering options for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RollKind {
    Attack,
    Damage,
    Save,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdvantageMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl AdvantageMode {
    /// Reads `advantage` / `disadvantage` flags from roll configuration.
    /// Both set cancel out.
    pub fn from_config(config: &ConfigMap) -> Self {
        let flag = |key: &str| config.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        match (flag("advantage"), flag("disadvantage")) {
            (true, false) => AdvantageMode::Advantage,
            (false, true) => AdvantageMode::Disadvantage,
            _ => AdvantageMode::Normal,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackRollRequest {
    pub actor: EntityRef,
    pub item: EntityRef,
    pub target: EntityRef,
    pub bonus: i32,
    pub mode: AdvantageMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DamageRollRequest {
    pub actor: EntityRef,
    pub item: EntityRef,
    pub parts: Vec<DamagePartSpec>,
    pub critical: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveRollRequest {
    pub actor: EntityRef,
    pub ability: String,
    pub dc: i32,
    pub bonus: i32,
}

/// One call to the damage service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DamageApplication {
    pub item: EntityRef,
    pub parts: Vec<DamagePart>,
    /// Targets taking full damage.
    pub full: Vec<EntityRef>,
    /// Targets taking half damage after a successful save.
    pub half: Vec<EntityRef>,
}

impl DamageApplication {
    pub fn total(&self) -> i32 {
        self.parts.iter().map(|part| part.total).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DamageOutcome {
    pub applied: Vec<(EntityRef, i32)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectRequest {
    pub item: EntityRef,
    pub actor: EntityRef,
    pub application: ApplicationType,
    pub effects: Vec<EffectSpec>,
    pub targets: Vec<EntityRef>,
    pub effective_targets: Vec<EntityRef>,
    pub master_effect: Option<EntityRef>,
    pub config: ConfigMap,
    pub condition: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedEffect {
    pub uuid: EntityRef,
    pub target: Option<EntityRef>,
    /// A long-lived effect later activations are triggered from.
    pub master: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemplateRequest {
    pub item: EntityRef,
    pub actor: EntityRef,
    pub application: ApplicationType,
    pub config: ConfigMap,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateData {
    pub uuid: EntityRef,
    /// Tokens inside the placed area.
    pub targets: Vec<EntityRef>,
}
