use activation_core::{ApplicationType, Mutation};
use tracing::info;

use super::{StepContext, Transition};
use crate::api::Result;
use crate::services::EffectRequest;

/// Applies the phase's effects and records what was created. The first
/// master effect of an immediate activation links later triggered ones.
pub(super) async fn apply(ctx: &StepContext<'_>) -> Result<Transition> {
    let record = ctx.record;
    let request = EffectRequest {
        item: record.item_ref.clone(),
        actor: record.actor_ref.clone(),
        application: record.application_type,
        effects: ctx.phase.effects.clone(),
        targets: record.target_uuids.clone(),
        effective_targets: record.effective_target_uuids.clone(),
        master_effect: record.master_effect_uuid.clone(),
        config: record.config.clone(),
        condition: record.condition.clone(),
    };
    let created = ctx.services().effects.apply_effects(&request).await?;

    info!(
        target: "activation::resolver",
        record = %ctx.id,
        created = created.len(),
        "effects applied"
    );

    let mut mutations = Vec::new();
    if record.application_type == ApplicationType::Immediate
        && record.master_effect_uuid.is_none()
        && let Some(master) = created.iter().find(|effect| effect.master)
    {
        mutations.push(Mutation::SetMasterEffect {
            effect: master.uuid.clone(),
        });
    }
    if !created.is_empty() {
        mutations.push(Mutation::AddCreatedEffects {
            effects: created.into_iter().map(|effect| effect.uuid).collect(),
        });
    }
    Ok(Transition::idle(mutations))
}
