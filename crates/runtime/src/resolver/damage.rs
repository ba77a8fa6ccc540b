//! Damage rolls and application.

use activation_core::{AttackOutcome, DamagePart, Mutation, Step};
use tracing::{debug, info};

use super::{StepContext, Transition};
use crate::api::Result;
use crate::services::{DamageApplication, DamageRollRequest};

async fn roll_parts(ctx: &StepContext<'_>, critical: bool) -> Result<Vec<DamagePart>> {
    let request = DamageRollRequest {
        actor: ctx.record.actor_ref.clone(),
        item: ctx.record.item_ref.clone(),
        parts: ctx.phase.damage.clone(),
        critical,
    };
    Ok(ctx.services().rolls.roll_damage(&request).await?)
}

pub(super) async fn roll_attack_damage(ctx: &StepContext<'_>) -> Result<Transition> {
    let Some(attack) = &ctx.record.attack else {
        return Ok(Transition::idle(Vec::new()));
    };
    let hit = attack.result == Some(AttackOutcome::Hit);
    if !hit || ctx.record.effective_target_uuids.is_empty() || !ctx.phase.has_damage() {
        return Ok(Transition::idle(Vec::new()));
    }
    if ctx.rules().manual_damage_rolls {
        return Ok(Transition::to(Step::WaitingForAttackDamageRoll, Vec::new()));
    }

    let critical = attack.roll.natural == Some(20);
    let parts = roll_parts(ctx, critical).await?;
    Ok(Transition::idle(vec![Mutation::SetDamage { parts }]))
}

pub(super) fn await_attack_damage(ctx: &StepContext<'_>) -> Result<Transition> {
    if ctx.record.damage.is_none() {
        return Ok(Transition::Stall);
    }
    Ok(Transition::idle(Vec::new()))
}

pub(super) async fn roll(ctx: &StepContext<'_>) -> Result<Transition> {
    if !ctx.phase.has_damage() {
        return Ok(Transition::idle(Vec::new()));
    }
    let parts = roll_parts(ctx, false).await?;
    Ok(Transition::idle(vec![Mutation::SetDamage { parts }]))
}

/// One damage service call: effective targets take full damage, targets that
/// saved take half when the phase allows it.
pub(super) async fn apply(ctx: &StepContext<'_>) -> Result<Transition> {
    let Some(parts) = &ctx.record.damage else {
        debug!(target: "activation::resolver", record = %ctx.id, "no damage rolled");
        return Ok(Transition::idle(Vec::new()));
    };

    let full = ctx.record.effective_target_uuids.clone();
    let half = if ctx.phase.halves_on_save() {
        ctx.record
            .unaffected_targets()
            .into_iter()
            .filter(|target| ctx.record.save_for(target).is_some())
            .collect()
    } else {
        Vec::new()
    };
    let application = DamageApplication {
        item: ctx.record.item_ref.clone(),
        parts: parts.clone(),
        full,
        half,
    };

    let outcome = ctx
        .services()
        .damage
        .apply_damage(&ctx.record.actor_ref, &application)
        .await?;
    info!(
        target: "activation::resolver",
        record = %ctx.id,
        total = application.total(),
        full = application.full.len(),
        half = application.half.len(),
        applied = outcome.applied.len(),
        "damage applied"
    );
    Ok(Transition::idle(Vec::new()))
}
