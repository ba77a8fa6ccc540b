//! Saving throws.
//!
//! Players roll their own saves through the client API; GM-controlled actors
//! are rolled automatically when the rules allow it. Once every target has a
//! save the GM partitions targets into failures (affected) and successes.

use activation_core::{EntityRef, Mutation, SaveEntry, Step};
use tracing::{debug, info};

use super::{StepContext, Transition};
use crate::api::Result;
use crate::events::NoticeKey;
use crate::services::SaveRollRequest;

pub(super) async fn perform(ctx: &StepContext<'_>) -> Result<Transition> {
    let record = ctx.record;
    if ctx.phase.unavoidable {
        debug!(target: "activation::resolver", record = %ctx.id, "save skipped, unavoidable");
        return Ok(Transition::idle(vec![Mutation::SetEffectiveTargets {
            targets: record.target_uuids.clone(),
        }]));
    }
    if record.target_uuids.is_empty() {
        return Ok(Transition::idle(vec![Mutation::SetEffectiveTargets {
            targets: Vec::new(),
        }]));
    }
    let Some(save) = &ctx.phase.save else {
        return Ok(ctx.warn(NoticeKey::NoSaveDc));
    };
    if record.all_saves_recorded() {
        return Ok(Transition::to(Step::SavesCompleted, Vec::new()));
    }

    let mut mutations = Vec::new();
    if ctx.rules().auto_roll_npc_saves {
        for target in record.missing_saves() {
            let Some(sheet) = ctx.services().entities.actor(&target).await else {
                continue;
            };
            if !sheet.is_gm_controlled() {
                continue;
            }
            let request = SaveRollRequest {
                actor: target.clone(),
                ability: save.ability.clone(),
                dc: save.dc,
                bonus: sheet.save_bonus(&save.ability),
            };
            let roll = ctx.services().rolls.roll_save(&request).await?;
            mutations.push(Mutation::AddSave {
                save: SaveEntry {
                    actor: target,
                    roll,
                },
            });
        }
    }

    let mut projected = record.clone();
    projected.apply_all(&mutations);
    let next = if projected.all_saves_recorded() {
        Step::SavesCompleted
    } else {
        Step::WaitingForSaves
    };
    debug!(
        target: "activation::resolver",
        record = %ctx.id,
        rolled = mutations.len(),
        missing = projected.missing_saves().len(),
        "saves requested"
    );
    Ok(Transition::to(next, mutations))
}

pub(super) fn await_saves(ctx: &StepContext<'_>) -> Result<Transition> {
    if !ctx.record.all_saves_recorded() {
        return Ok(Transition::Stall);
    }
    Ok(Transition::to(Step::SavesCompleted, Vec::new()))
}

/// Failures (roll below DC, or no save on record) are affected.
pub(super) async fn completed(ctx: &StepContext<'_>) -> Result<Transition> {
    let Some(dc) = ctx.phase.save_dc() else {
        return Ok(ctx.warn(NoticeKey::NoSaveDc));
    };

    let (failures, successes): (Vec<EntityRef>, Vec<EntityRef>) = ctx
        .record
        .target_uuids
        .iter()
        .cloned()
        .partition(|target| {
            ctx.record
                .save_for(target)
                .is_none_or(|save| save.roll.total < dc)
        });

    info!(
        target: "activation::resolver",
        record = %ctx.id,
        dc,
        failed = failures.len(),
        saved = successes.len(),
        "saves resolved"
    );

    let mut mutations = vec![Mutation::SetEffectiveTargets { targets: failures }];
    if ctx.profile.save_immunity && !successes.is_empty() {
        let mut granted = Vec::with_capacity(successes.len());
        for target in &successes {
            let effect = ctx
                .services()
                .effects
                .grant_save_immunity(target, &ctx.record.item_ref)
                .await?;
            granted.push(effect.uuid);
        }
        mutations.push(Mutation::AddTransientEffects { effects: granted });
    }
    Ok(Transition::idle(mutations))
}
