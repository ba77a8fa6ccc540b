use activation_core::{
    ActionProfile, ActivationRecord, ClientIdentity, MessageId, Mutation, PhaseProfile,
    RulesConfig, StateName, Step,
};

use super::Resolver;
use crate::events::NoticeKey;
use crate::extensions::ExtensionRegistry;
use crate::services::Services;

/// What a handler decided.
#[derive(Debug, PartialEq)]
pub(crate) enum Transition {
    /// Persist these mutations in one write.
    Commit(Vec<Mutation>),
    /// Waiting on input or blocked; write nothing.
    Stall,
}

impl Transition {
    pub(crate) fn to(state: impl Into<StateName>, mut mutations: Vec<Mutation>) -> Self {
        mutations.push(Mutation::state(state));
        Transition::Commit(mutations)
    }

    pub(crate) fn idle(mutations: Vec<Mutation>) -> Self {
        Self::to(Step::Idle, mutations)
    }
}

/// Everything a step handler reads.
pub(crate) struct StepContext<'a> {
    resolver: &'a Resolver,
    pub id: &'a MessageId,
    pub record: &'a ActivationRecord,
    pub profile: &'a ActionProfile,
    pub phase: PhaseProfile,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        resolver: &'a Resolver,
        id: &'a MessageId,
        record: &'a ActivationRecord,
        profile: &'a ActionProfile,
    ) -> Self {
        Self {
            resolver,
            id,
            record,
            profile,
            phase: profile.phase(record.application_type),
        }
    }

    pub(crate) fn services(&self) -> &Services {
        &self.resolver.services
    }

    pub(crate) fn extensions(&self) -> &ExtensionRegistry {
        &self.resolver.extensions
    }

    pub(crate) fn rules(&self) -> &RulesConfig {
        &self.resolver.rules
    }

    pub(crate) fn client(&self) -> &ClientIdentity {
        self.resolver.identity()
    }

    /// Attacks only happen on activations a user started.
    pub(crate) fn is_attack(&self) -> bool {
        self.profile.is_attack() && !self.record.application_type.is_triggered()
    }

    /// True when an attack or a save decides who is affected; otherwise
    /// every target is.
    pub(crate) fn gated(&self) -> bool {
        self.is_attack() || self.phase.has_save()
    }

    /// Publishes a user notice and stalls.
    pub(crate) fn warn(&self, key: NoticeKey) -> Transition {
        self.resolver.notify(self.id, key);
        Transition::Stall
    }
}
