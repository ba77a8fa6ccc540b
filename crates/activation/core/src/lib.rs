//! Deterministic activation logic and data types shared across clients.
//!
//! `activation-core` defines the canonical vocabulary (steps, roles, action
//! profiles) and the replicated [`ActivationRecord`] together with its
//! [`Mutation`] set. Everything here is pure: the async runtime owns I/O,
//! replication and scheduling, and depends on the types re-exported here.
pub mod action;
pub mod actor;
pub mod authority;
pub mod config;
pub mod error;
pub mod ids;
pub mod message;
pub mod pipeline;
pub mod record;
pub mod step;

pub use action::{
    ActionProfile, ApplicationType, AttackSpec, DamagePartSpec, EffectSpec, PhaseProfile, SaveSpec,
};
pub use actor::ActorSheet;
pub use authority::{ClientIdentity, Requirement, Role, Roles, required_role, role_for, roles_for};
pub use config::RulesConfig;
pub use error::{ActivationFault, ErrorSeverity, RecordError};
pub use ids::{EntityRef, MessageId, UserId};
pub use message::Message;
pub use pipeline::{FlowContext, compile_flow};
pub use record::{
    ActivationRecord, AttackData, AttackOutcome, ConfigMap, DamagePart, Mutation, RollResult,
    SaveEntry,
};
pub use step::{StateName, Step, StepCategory};
