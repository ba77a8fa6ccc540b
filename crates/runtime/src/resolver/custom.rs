use activation_core::{Mutation, StateName};
use tracing::{error, info};

use super::{StepContext, Transition};
use crate::api::Result;
use crate::events::NoticeKey;
use crate::extensions::{ExtensionContext, StepExtension};

/// Runs a registered extension. A failing extension writes nothing and
/// leaves the record where it was.
pub(super) async fn run(ctx: &StepContext<'_>, extension: &dyn StepExtension) -> Result<Transition> {
    let ext_ctx = ExtensionContext {
        record_id: ctx.id,
        record: ctx.record,
        profile: ctx.profile,
        client: ctx.client(),
        services: ctx.services(),
    };

    match extension.run(&ext_ctx).await {
        Ok(outcome) => {
            let next = outcome.next.unwrap_or(StateName::IDLE);
            info!(
                target: "activation::resolver",
                record = %ctx.id,
                extension = extension.name(),
                next = %next,
                "extension step ran"
            );
            let mut mutations = outcome.mutations;
            mutations.push(Mutation::SetState { state: Some(next) });
            Ok(Transition::Commit(mutations))
        }
        Err(err) => {
            error!(
                target: "activation::resolver",
                record = %ctx.id,
                extension = extension.name(),
                error = %err,
                "extension step failed"
            );
            Ok(ctx.warn(NoticeKey::TechnicalError))
        }
    }
}
