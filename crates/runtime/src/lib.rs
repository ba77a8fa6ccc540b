//! Async engine that resolves activations across GM and player clients.
//!
//! Every connected user runs one [`ActivationClient`]. Clients share a
//! [`DocumentStore`] holding one message per activation and agree on who may
//! execute each transition purely from replicated message metadata, so no
//! client ever coordinates with another beyond forwarding writes to the GM.
//!
//! Modules are organized by responsibility:
//! - [`client`] hosts the façade and its builder
//! - [`resolver`] holds the transition table and step handlers
//! - [`scheduler`] serializes and coalesces step requests per record
//! - [`bridge`] replicates record mutations (local write or GM forwarding)
//! - [`store`] and [`rpc`] define the transports with in-memory versions
//! - [`services`] and [`extensions`] are the seams for external collaborators
//! - [`events`] provides the topic-based event bus
//! - `workers` keeps background tasks internal to the crate
pub mod api;
pub mod bridge;
pub mod client;
pub mod config;
pub mod events;
pub mod extensions;
pub mod resolver;
pub mod rpc;
pub mod scheduler;
pub mod services;
pub mod store;

mod engine;
mod workers;

pub use api::{
    ActivationRequest, ConditionTrigger, MirrorMode, Result, RuntimeError, ServiceError,
    ServiceResult,
};
pub use bridge::{Commit, Precondition, ReplicationBridge};
pub use client::{ActivationClient, ClientBuilder};
pub use config::RuntimeConfig;
pub use events::{Event, EventBus, LifecycleEvent, Notice, NoticeKey, NoticeLevel, Topic};
pub use extensions::{
    AttackRollContext, AttackRollHook, ExtensionContext, ExtensionError, ExtensionOutcome,
    ExtensionRegistry, RunAs, StepExtension,
};
pub use resolver::Resolver;
pub use rpc::{LocalRpcHub, RemoteCall, RemoteChannel, RemoteReply, RpcEnvelope, RpcInbox};
pub use scheduler::{Scheduled, StepOutcome, StepScheduler};
pub use services::{
    AdvantageMode, CatalogResolver, CreatedEffect, DamageApplication, DamageOutcome,
    DamageService, EffectRequest, EffectService, EntityResolver, FixedPrompts, FixedTemplates,
    MemoryServices, PromptService, RecordingDamage, RecordingEffects, RollKind, RollService,
    ScriptedDice, Services, TemplateData, TemplateRequest, TemplateService,
};
pub use store::{DocumentStore, InMemoryStore, StoreError, StoreEvent};
