//! Attack roll and its resolution.

use activation_core::{AttackData, AttackOutcome, ConfigMap, EntityRef, Mutation, RollResult, Step};
use tracing::debug;

use super::{StepContext, Transition};
use crate::api::Result;
use crate::events::NoticeKey;
use crate::extensions::AttackRollContext;
use crate::services::{AdvantageMode, AttackRollRequest, RollKind};

const NATURAL_HIT: i32 = 20;
const NATURAL_MISS: i32 = 1;

fn config_bonus(config: &ConfigMap, key: &str) -> i32 {
    config
        .get(key)
        .and_then(serde_json::Value::as_i64)
        .and_then(|bonus| i32::try_from(bonus).ok())
        .unwrap_or(0)
}

pub(super) async fn roll(ctx: &StepContext<'_>) -> Result<Transition> {
    let [target] = ctx.record.target_uuids.as_slice() else {
        return Ok(ctx.warn(NoticeKey::SingleTargetRequired));
    };

    let Some(options) = ctx
        .services()
        .prompts
        .roll_options(&ctx.client().user, RollKind::Attack)
        .await
    else {
        return Ok(ctx.warn(NoticeKey::RollCancelled));
    };

    let mut config = ctx.record.config.clone();
    config.extend(options.clone());

    let hooks = ctx.extensions().attack_bonus(&AttackRollContext {
        record: ctx.record,
        profile: ctx.profile,
        target,
        config: &config,
    });
    let request = AttackRollRequest {
        actor: ctx.record.actor_ref.clone(),
        item: ctx.record.item_ref.clone(),
        target: target.clone(),
        bonus: ctx
            .profile
            .attack_bonus()
            .saturating_add(config_bonus(&config, "attackBonus"))
            .saturating_add(hooks),
        mode: AdvantageMode::from_config(&config),
    };
    let roll = ctx.services().rolls.roll_attack(&request).await?;

    let result = if ctx.rules().auto_resolve_attacks {
        resolve(ctx, target, &roll).await
    } else {
        None
    };
    debug!(
        target: "activation::resolver",
        record = %ctx.id,
        total = roll.total,
        ?result,
        "attack rolled"
    );

    let attack = AttackData {
        target: target.clone(),
        roll,
        result,
        options: options.clone(),
    };
    Ok(Transition::to(Step::WaitingForAttackResult, vec![
        Mutation::MergeConfig { config: options },
        Mutation::SetAttack { attack },
    ]))
}

/// Natural 20 always hits, natural 1 always misses, otherwise compare to AC.
/// Unknown targets are left for the GM to decide.
async fn resolve(
    ctx: &StepContext<'_>,
    target: &EntityRef,
    roll: &RollResult,
) -> Option<AttackOutcome> {
    match roll.natural {
        Some(NATURAL_HIT) => return Some(AttackOutcome::Hit),
        Some(NATURAL_MISS) => return Some(AttackOutcome::Miss),
        _ => {}
    }
    let sheet = ctx.services().entities.actor(target).await?;
    Some(if roll.total >= sheet.armor_class {
        AttackOutcome::Hit
    } else {
        AttackOutcome::Miss
    })
}

pub(super) fn await_result(ctx: &StepContext<'_>) -> Result<Transition> {
    let Some(attack) = &ctx.record.attack else {
        return Ok(Transition::Stall);
    };
    let Some(result) = attack.result else {
        return Ok(Transition::Stall);
    };

    let effective = match result {
        AttackOutcome::Hit => vec![attack.target.clone()],
        AttackOutcome::Miss => Vec::new(),
    };
    Ok(Transition::idle(vec![Mutation::SetEffectiveTargets {
        targets: effective,
    }]))
}
