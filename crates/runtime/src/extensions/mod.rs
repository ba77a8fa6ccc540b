//! Extension points for custom flow steps.
//!
//! Actions may list custom step names in their profile; the compiled flow then
//! contains those names and the resolver dispatches them to the
//! [`StepExtension`] registered under the same name. Extensions also get to
//! contribute bonuses right before an attack is rolled.
//!
//! # Authority
//!
//! A custom step declares who runs it through [`RunAs`]: steps that roll dice
//! or prompt run on the originator's client, steps that mutate the world run
//! on the GM's.

mod registry;

pub use registry::ExtensionRegistry;

use async_trait::async_trait;
use thiserror::Error;

use activation_core::{
    ActionProfile, ActivationRecord, ClientIdentity, ConfigMap, EntityRef, MessageId, Mutation,
    Role, StateName,
};

use crate::services::Services;

/// Which client runs a custom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunAs {
    /// The originator, who rolls and answers prompts.
    Roller,
    /// The GM, who may touch any document.
    #[default]
    Gm,
}

impl RunAs {
    pub fn role(self) -> Role {
        match self {
            RunAs::Roller => Role::Originator,
            RunAs::Gm => Role::Gm,
        }
    }
}

/// Failure inside an extension. Reported to the invoking user; nothing is
/// written.
#[derive(Debug, Clone, Error)]
#[error("extension {extension} failed: {message}")]
pub struct ExtensionError {
    pub extension: String,
    pub message: String,
}

impl ExtensionError {
    pub fn new(extension: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            message: message.into(),
        }
    }
}

/// What the extension sees when its step runs.
pub struct ExtensionContext<'a> {
    pub record_id: &'a MessageId,
    pub record: &'a ActivationRecord,
    pub profile: &'a ActionProfile,
    pub client: &'a ClientIdentity,
    pub services: &'a Services,
}

/// Data to persist and where to go next.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtensionOutcome {
    pub mutations: Vec<Mutation>,
    /// Next state; `None` returns to `idle`.
    pub next: Option<StateName>,
}

impl ExtensionOutcome {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn then(mut self, state: impl Into<StateName>) -> Self {
        self.next = Some(state.into());
        self
    }
}

/// Handler for one custom flow step.
#[async_trait]
pub trait StepExtension: Send + Sync {
    /// The state name this extension handles.
    fn name(&self) -> &str;

    fn run_as(&self) -> RunAs {
        RunAs::Gm
    }

    async fn run(&self, ctx: &ExtensionContext<'_>) -> Result<ExtensionOutcome, ExtensionError>;
}

/// Inputs of an attack about to be rolled.
pub struct AttackRollContext<'a> {
    pub record: &'a ActivationRecord,
    pub profile: &'a ActionProfile,
    pub target: &'a EntityRef,
    pub config: &'a ConfigMap,
}

/// Contributes a flat bonus to attack rolls.
///
/// Hooks run in priority order (lower first); their bonuses add up.
pub trait AttackRollHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32 {
        0
    }

    fn bonus(&self, ctx: &AttackRollContext<'_>) -> i32;
}
