//! Target selection and template placement.

use activation_core::{EntityRef, Mutation, Step};
use tracing::debug;

use super::{StepContext, Transition};
use crate::api::Result;
use crate::events::NoticeKey;
use crate::services::TemplateRequest;

/// Targets carry over as affected unless an attack or save decides.
fn select(ctx: &StepContext<'_>, targets: Vec<EntityRef>) -> Vec<Mutation> {
    let mut mutations = Vec::with_capacity(2);
    if !ctx.gated() {
        mutations.push(Mutation::SetEffectiveTargets {
            targets: targets.clone(),
        });
    }
    mutations.insert(0, Mutation::SetTargets { targets });
    mutations
}

pub(super) async fn apply_selected(ctx: &StepContext<'_>) -> Result<Transition> {
    let targets = if ctx.record.target_uuids.is_empty() {
        ctx.services()
            .prompts
            .selected_targets(&ctx.client().user)
            .await
    } else {
        ctx.record.target_uuids.clone()
    };

    if targets.is_empty() {
        return Ok(ctx.warn(NoticeKey::NoTargets));
    }
    if ctx.is_attack() && targets.len() != 1 {
        return Ok(ctx.warn(NoticeKey::SingleTargetRequired));
    }

    let needs_confirmation = ctx.rules().confirm_targets
        && !ctx.record.is_triggered()
        && !ctx.record.targets_confirmed;
    if needs_confirmation {
        debug!(
            target: "activation::resolver",
            record = %ctx.id,
            targets = targets.len(),
            "awaiting target confirmation"
        );
        return Ok(Transition::to(
            Step::WaitingForTargetConfirmation,
            vec![Mutation::SetTargets { targets }],
        ));
    }

    Ok(Transition::idle(select(ctx, targets)))
}

pub(super) fn await_confirmation(ctx: &StepContext<'_>) -> Result<Transition> {
    if !ctx.record.targets_confirmed {
        return Ok(Transition::Stall);
    }
    if ctx.record.target_uuids.is_empty() {
        return Ok(ctx.warn(NoticeKey::NoTargets));
    }
    if ctx.is_attack() && ctx.record.target_uuids.len() != 1 {
        return Ok(ctx.warn(NoticeKey::SingleTargetRequired));
    }
    Ok(Transition::idle(select(ctx, ctx.record.target_uuids.clone())))
}

pub(super) async fn place_template(ctx: &StepContext<'_>) -> Result<Transition> {
    let request = TemplateRequest {
        item: ctx.record.item_ref.clone(),
        actor: ctx.record.actor_ref.clone(),
        application: ctx.record.application_type,
        config: ctx.record.config.clone(),
    };
    let Some(template) = ctx.services().templates.create_template(&request).await? else {
        return Ok(ctx.warn(NoticeKey::TemplateCancelled));
    };

    debug!(
        target: "activation::resolver",
        record = %ctx.id,
        template = %template.uuid,
        targets = template.targets.len(),
        "template placed"
    );
    let mut mutations = vec![Mutation::SetTemplate {
        template: template.uuid,
    }];
    mutations.extend(select(ctx, template.targets));
    Ok(Transition::idle(mutations))
}
