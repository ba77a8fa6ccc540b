//! Collaborator contracts the resolver delegates side effects to.

use async_trait::async_trait;

use activation_core::{
    ActionProfile, ActorSheet, ConfigMap, DamagePart, EntityRef, RollResult, UserId,
};

use super::types::{
    AttackRollRequest, CreatedEffect, DamageApplication, DamageOutcome, DamageRollRequest,
    EffectRequest, RollKind, SaveRollRequest, TemplateData, TemplateRequest,
};
use crate::api::ServiceResult;

/// Resolves items and actors referenced by a record.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    async fn action(&self, item: &EntityRef) -> Option<ActionProfile>;

    async fn actor(&self, actor: &EntityRef) -> Option<ActorSheet>;

    /// Removes a consumed item.
    async fn delete_item(&self, item: &EntityRef) -> ServiceResult<()>;
}

/// Dice evaluation.
#[async_trait]
pub trait RollService: Send + Sync {
    async fn roll_attack(&self, request: &AttackRollRequest) -> ServiceResult<RollResult>;

    async fn roll_damage(&self, request: &DamageRollRequest) -> ServiceResult<Vec<DamagePart>>;

    async fn roll_save(&self, request: &SaveRollRequest) -> ServiceResult<RollResult>;
}

#[async_trait]
pub trait DamageService: Send + Sync {
    async fn apply_damage(
        &self,
        source: &EntityRef,
        application: &DamageApplication,
    ) -> ServiceResult<DamageOutcome>;
}

#[async_trait]
pub trait EffectService: Send + Sync {
    async fn apply_effects(&self, request: &EffectRequest) -> ServiceResult<Vec<CreatedEffect>>;

    /// Creates a one-shot effect sparing `target` from further saves.
    async fn grant_save_immunity(
        &self,
        target: &EntityRef,
        item: &EntityRef,
    ) -> ServiceResult<CreatedEffect>;

    async fn remove_effects(&self, effects: &[EntityRef]) -> ServiceResult<()>;
}

#[async_trait]
pub trait TemplateService: Send + Sync {
    /// Places an area template; `None` when the user cancelled.
    async fn create_template(&self, request: &TemplateRequest)
    -> ServiceResult<Option<TemplateData>>;
}

/// Interaction with the local user.
#[async_trait]
pub trait PromptService: Send + Sync {
    /// Tokens the user currently has targeted.
    async fn selected_targets(&self, user: &UserId) -> Vec<EntityRef>;

    /// Asks for roll options; `None` when the dialog was dismissed.
    async fn roll_options(&self, user: &UserId, kind: RollKind) -> Option<ConfigMap>;
}
