//! One-time terminal cleanup, run by the GM.

use activation_core::{ActivationRecord, MessageId, Mutation, Role, Roles};
use tracing::{info, warn};

use super::Resolver;
use crate::api::Result;
use crate::bridge::Precondition;
use crate::events::{Event, LifecycleEvent};
use crate::scheduler::StepOutcome;

/// Marks the record finalized, then consumes the item, removes transient
/// effects and drops instantaneous messages. Finalizing first keeps the
/// cleanup from running twice when another step request races in.
pub(super) async fn finalize(
    resolver: &Resolver,
    id: &MessageId,
    record: &ActivationRecord,
    roles: Roles,
) -> Result<StepOutcome> {
    if record.finalized || !roles.permits(Role::Gm) {
        return Ok(StepOutcome::Terminal);
    }

    let commit = resolver
        .bridge
        .mutate(id, Precondition::in_state(None), vec![Mutation::Finalize])
        .await?;
    if !commit.is_applied() {
        return Ok(StepOutcome::Terminal);
    }

    let profile = resolver.services.entities.action(&record.item_ref).await;
    if let Some(profile) = &profile
        && profile.consumes_item
        && let Err(err) = resolver.services.entities.delete_item(&record.item_ref).await
    {
        warn!(
            target: "activation::resolver",
            record = %id,
            item = %record.item_ref,
            error = %err,
            "failed to consume item"
        );
    }

    if !record.transient_effect_uuids.is_empty() {
        match resolver
            .services
            .effects
            .remove_effects(&record.transient_effect_uuids)
            .await
        {
            Ok(()) => {
                resolver
                    .bridge
                    .mutate(id, Precondition::Any, vec![Mutation::ClearTransientEffects])
                    .await?;
            }
            // left on the record for the deletion cleanup to retry
            Err(err) => warn!(
                target: "activation::resolver",
                record = %id,
                effects = record.transient_effect_uuids.len(),
                error = %err,
                "failed to remove transient effects"
            ),
        }
    }

    info!(target: "activation::resolver", record = %id, "activation completed");
    resolver
        .events
        .publish(Event::Lifecycle(LifecycleEvent::Completed { record: id.clone() }));

    let instantaneous = profile.as_ref().is_some_and(|profile| profile.instantaneous);
    if instantaneous && resolver.rules.delete_instantaneous {
        resolver.bridge.delete(id).await?;
    }
    Ok(StepOutcome::Terminal)
}
