//! External collaborators the resolver delegates to.
//!
//! Every side effect outside the replicated record (dice, damage, effects,
//! templates, prompts, item lookup) goes through one of these traits. They
//! are bundled into [`Services`] so a client is wired up in one place.
mod memory;
mod traits;
mod types;

use std::sync::Arc;

pub use memory::{
    CatalogResolver, FixedPrompts, FixedTemplates, MemoryServices, RecordingDamage,
    RecordingEffects, ScriptedDice,
};
pub use traits::{
    DamageService, EffectService, EntityResolver, PromptService, RollService, TemplateService,
};
pub use types::{
    AdvantageMode, AttackRollRequest, CreatedEffect, DamageApplication, DamageOutcome,
    DamageRollRequest, EffectRequest, RollKind, SaveRollRequest, TemplateData, TemplateRequest,
};

/// Every collaborator one client talks to.
#[derive(Clone)]
pub struct Services {
    pub entities: Arc<dyn EntityResolver>,
    pub rolls: Arc<dyn RollService>,
    pub damage: Arc<dyn DamageService>,
    pub effects: Arc<dyn EffectService>,
    pub templates: Arc<dyn TemplateService>,
    pub prompts: Arc<dyn PromptService>,
}

impl Services {
    pub fn new(
        entities: Arc<dyn EntityResolver>,
        rolls: Arc<dyn RollService>,
        damage: Arc<dyn DamageService>,
        effects: Arc<dyn EffectService>,
        templates: Arc<dyn TemplateService>,
        prompts: Arc<dyn PromptService>,
    ) -> Self {
        Self {
            entities,
            rolls,
            damage,
            effects,
            templates,
            prompts,
        }
    }
}
