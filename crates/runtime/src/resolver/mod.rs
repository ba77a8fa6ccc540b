//! The activation state machine.
//!
//! [`Resolver::step`] executes at most one transition of one record for the
//! local client:
//!
//! 1. load the record and compute the client's roles for its message;
//! 2. look up which role the current state requires and bail out silently
//!    when the client does not hold it;
//! 3. run the state's handler, which performs side effects through the
//!    external services and returns the mutations to persist;
//! 4. write data and new state in one replicated write.
//!
//! Handlers that cannot proceed (missing targets, dismissed dialogs) publish
//! a notice and stall; nothing is written and no retry is scheduled.

mod attack;
mod cleanup;
mod context;
mod custom;
mod damage;
mod effects;
mod saves;
mod targets;

use std::sync::Arc;

use tracing::{debug, trace, warn};

use activation_core::{
    ClientIdentity, MessageId, Mutation, Requirement, RulesConfig, StateName, Step, required_role,
    roles_for,
};

use crate::api::Result;
use crate::bridge::{Commit, Precondition, ReplicationBridge};
use crate::events::{Event, EventBus, Notice, NoticeKey};
use crate::extensions::ExtensionRegistry;
use crate::scheduler::StepOutcome;
use crate::services::Services;

pub(crate) use context::{StepContext, Transition};

pub struct Resolver {
    bridge: Arc<ReplicationBridge>,
    services: Services,
    extensions: ExtensionRegistry,
    rules: RulesConfig,
    events: EventBus,
}

impl Resolver {
    pub fn new(
        bridge: Arc<ReplicationBridge>,
        services: Services,
        extensions: ExtensionRegistry,
        rules: RulesConfig,
        events: EventBus,
    ) -> Self {
        Self {
            bridge,
            services,
            extensions,
            rules,
            events,
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        self.bridge.identity()
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Executes one transition of `id` if this client is entitled to it.
    pub async fn step(&self, id: &MessageId) -> Result<StepOutcome> {
        let Some((message, record)) = self.bridge.load(id).await? else {
            trace!(target: "activation::resolver", record = %id, "record gone");
            return Ok(StepOutcome::Terminal);
        };
        if message.is_mirror() {
            return Ok(StepOutcome::Parked);
        }

        let roles = roles_for(self.identity(), &message);
        let Some(state) = record.state.clone() else {
            return cleanup::finalize(self, id, &record, roles).await;
        };
        if roles.is_observer() {
            return Ok(StepOutcome::Parked);
        }

        let extension = match required_role(Some(&state)) {
            Requirement::Role(role) => {
                if !roles.permits(role) {
                    trace!(
                        target: "activation::resolver",
                        record = %id,
                        state = %state,
                        required = %role,
                        "not authorized for state"
                    );
                    return Ok(StepOutcome::Parked);
                }
                None
            }
            Requirement::Extension => {
                let Some(extension) = self.extensions.find(state.as_str()) else {
                    warn!(
                        target: "activation::resolver",
                        record = %id,
                        state = %state,
                        "no extension registered for state"
                    );
                    return Ok(StepOutcome::Parked);
                };
                if !roles.permits(extension.run_as().role()) {
                    return Ok(StepOutcome::Parked);
                }
                Some(extension.clone())
            }
        };

        debug!(
            target: "activation::resolver",
            record = %id,
            state = %state,
            client = %self.identity().user,
            "executing step"
        );

        if state.is(Step::Idle) {
            return self
                .commit(id, &record.state, Transition::Commit(vec![Mutation::AdvanceFlow]))
                .await;
        }

        let Some(profile) = self.services.entities.action(&record.item_ref).await else {
            self.notify(id, NoticeKey::ItemMissing);
            return Ok(StepOutcome::Parked);
        };
        let ctx = StepContext::new(self, id, &record, &profile);

        let transition = match (state.step(), extension) {
            (_, Some(extension)) => custom::run(&ctx, extension.as_ref()).await?,
            (Some(step), None) => self.dispatch(step, &ctx).await?,
            (None, None) => Transition::Stall,
        };

        self.commit(id, &record.state, transition).await
    }

    async fn dispatch(&self, step: Step, ctx: &StepContext<'_>) -> Result<Transition> {
        match step {
            Step::Idle => Ok(Transition::Commit(vec![Mutation::AdvanceFlow])),
            Step::ApplySelectedTargets => targets::apply_selected(ctx).await,
            Step::WaitingForTargetConfirmation => targets::await_confirmation(ctx),
            Step::PlaceTemplate => targets::place_template(ctx).await,
            Step::PerformAttackRoll => attack::roll(ctx).await,
            Step::WaitingForAttackResult => attack::await_result(ctx),
            Step::PerformAttackDamageRoll => damage::roll_attack_damage(ctx).await,
            Step::WaitingForAttackDamageRoll => damage::await_attack_damage(ctx),
            Step::PerformDamageRoll => damage::roll(ctx).await,
            Step::ApplyDamage => damage::apply(ctx).await,
            Step::PerformSavingThrow => saves::perform(ctx).await,
            Step::WaitingForSaves => saves::await_saves(ctx),
            Step::SavesCompleted => saves::completed(ctx).await,
            Step::ApplyEffects => effects::apply(ctx).await,
        }
    }

    /// Persists a transition guarded on the state it was computed from.
    async fn commit(
        &self,
        id: &MessageId,
        from: &Option<StateName>,
        transition: Transition,
    ) -> Result<StepOutcome> {
        let Transition::Commit(mutations) = transition else {
            return Ok(StepOutcome::Parked);
        };

        match self
            .bridge
            .mutate(id, Precondition::in_state(from.clone()), mutations)
            .await?
        {
            Commit::Applied { record, .. } if record.state != *from => {
                Ok(StepOutcome::Transitioned)
            }
            Commit::Applied { .. } | Commit::Unchanged { .. } => Ok(StepOutcome::Parked),
            // Someone else moved the record; look again.
            Commit::Stale => Ok(StepOutcome::Transitioned),
            Commit::Missing => Ok(StepOutcome::Terminal),
        }
    }

    pub(crate) fn notify(&self, id: &MessageId, key: NoticeKey) {
        warn!(
            target: "activation::resolver",
            record = %id,
            client = %self.identity().user,
            notice = key.localization_key(),
            "step stalled"
        );
        self.events.publish(Event::Notice(Notice::new(
            key,
            id.clone(),
            self.identity().user.clone(),
        )));
    }
}
