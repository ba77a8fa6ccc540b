//! Client façade.
//!
//! One [`ActivationClient`] runs per connected user. It starts activations,
//! feeds user input (target confirmation, attack results, damage, saves) into
//! records, and drives the local scheduler. Background workers keep it in
//! step with changes made by other clients.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use activation_core::{
    ActionProfile, ActivationRecord, ApplicationType, AttackOutcome, ClientIdentity, DamagePart,
    EntityRef, Message, MessageId, Mutation, Requirement, SaveEntry, Step, UserId, compile_flow,
    required_role, roles_for,
};

use crate::api::{ActivationRequest, ConditionTrigger, MirrorMode, Result, RuntimeError};
use crate::bridge::{Commit, Precondition, ReplicationBridge};
use crate::config::RuntimeConfig;
use crate::engine::Engine;
use crate::events::{Event, EventBus, LifecycleEvent, Topic};
use crate::extensions::ExtensionRegistry;
use crate::resolver::Resolver;
use crate::rpc::{RemoteChannel, RpcInbox};
use crate::scheduler::{Scheduled, StepScheduler};
use crate::services::{SaveRollRequest, Services};
use crate::store::DocumentStore;
use crate::workers::{RpcWorker, SyncWorker};

struct ClientInner {
    engine: Arc<Engine>,
    workers: Vec<JoinHandle<()>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// Cloneable handle to one client's activation engine.
#[derive(Clone)]
pub struct ActivationClient {
    inner: Arc<ClientInner>,
}

impl ActivationClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub fn identity(&self) -> &ClientIdentity {
        self.engine().identity()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.engine().config
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.engine().events.subscribe(topic)
    }

    /// Current replicated record, if the message exists.
    pub async fn record(&self, id: &MessageId) -> Result<Option<ActivationRecord>> {
        Ok(self.engine().bridge.load(id).await?.map(|(_, record)| record))
    }

    /// Starts an activation of `request.item` and returns its id.
    pub async fn activate(&self, request: ActivationRequest) -> Result<MessageId> {
        let identity = self.identity().clone();
        let profile = self.resolve_action(&request.item).await?;

        let steps = compile_flow(&profile, ApplicationType::Immediate);
        let mut record = ActivationRecord::new(
            request.item,
            request.actor,
            ApplicationType::Immediate,
            steps,
        );
        record.config = request.config;
        record.target_uuids = request.targets;

        let originator = if identity.is_gm {
            request.on_behalf_of
        } else {
            Some(identity.user.clone())
        };
        self.start(record, originator, request.mirrors).await
    }

    /// Starts a follow-up activation fired by a persistent effect. GM only.
    pub async fn trigger_condition(&self, trigger: ConditionTrigger) -> Result<MessageId> {
        if !self.identity().is_gm {
            return Err(RuntimeError::GmOnly {
                operation: "trigger_condition",
            });
        }
        let profile = self.resolve_action(&trigger.item).await?;

        let steps = compile_flow(&profile, trigger.application);
        let mut record =
            ActivationRecord::new(trigger.item, trigger.actor, trigger.application, steps);
        record.condition = Some(trigger.condition);
        record.source_effect_uuid = trigger.source_effect;
        record.master_effect_uuid = trigger.master_effect;
        record.target_uuids = trigger.targets;
        record.config = trigger.config;

        self.start(record, None, MirrorMode::None).await
    }

    async fn resolve_action(&self, item: &EntityRef) -> Result<ActionProfile> {
        self.engine()
            .services
            .entities
            .action(item)
            .await
            .ok_or_else(|| RuntimeError::UnknownItem { item: item.clone() })
    }

    async fn start(
        &self,
        record: ActivationRecord,
        originator: Option<UserId>,
        mirrors: MirrorMode,
    ) -> Result<MessageId> {
        let engine = self.engine();
        let author = engine.identity().user.clone();
        let message = Message::primary(
            MessageId::from("pending"),
            author.clone(),
            originator,
            &record,
        )?;
        let created = engine.bridge.create(message, mirrors).await?;
        let id = created.id;

        info!(
            target: "activation::client",
            record = %id,
            item = %record.item_ref,
            application = %record.application_type,
            steps = record.flow_steps.len(),
            client = %author,
            "activation started"
        );
        engine
            .events
            .publish(Event::Lifecycle(LifecycleEvent::Created {
                record: id.clone(),
                item: record.item_ref,
                author,
            }));

        if engine.config.auto_step {
            self.request_step(&id).await?;
        }
        Ok(id)
    }

    /// Runs every step this client may execute, then nudges the GM if the
    /// record is waiting on a GM-only transition.
    pub async fn request_step(&self, id: &MessageId) -> Result<Scheduled> {
        let engine = self.engine();
        let scheduled = engine.step(id).await?;
        if engine.identity().is_gm || !engine.bridge.has_remote() {
            return Ok(scheduled);
        }

        let Some((message, record)) = engine.bridge.load(id).await? else {
            return Ok(scheduled);
        };
        if message.is_mirror() || record.finalized {
            return Ok(scheduled);
        }
        let roles = roles_for(engine.identity(), &message);
        let blocked = match required_role(record.state.as_ref()) {
            Requirement::Role(role) => !roles.permits(role),
            Requirement::Extension => true,
        };
        if blocked {
            debug!(
                target: "activation::client",
                record = %id,
                state = ?record.state,
                "asking GM to continue"
            );
            engine.bridge.request_remote_step(id).await?;
        }
        Ok(scheduled)
    }

    /// Runs the local scheduler only, without contacting the GM.
    pub async fn step_local(&self, id: &MessageId) -> Result<Scheduled> {
        self.engine().step(id).await
    }

    /// Confirms the target selection, optionally replacing it.
    pub async fn confirm_targets(
        &self,
        id: &MessageId,
        targets: Option<Vec<EntityRef>>,
    ) -> Result<Commit> {
        let mut mutations = Vec::with_capacity(2);
        if let Some(targets) = targets {
            mutations.push(Mutation::SetTargets { targets });
        }
        mutations.push(Mutation::SetTargetsConfirmed { confirmed: true });
        self.submit(id, Step::WaitingForTargetConfirmation, mutations)
            .await
    }

    /// Records the GM's hit/miss decision.
    pub async fn record_attack_result(
        &self,
        id: &MessageId,
        outcome: AttackOutcome,
    ) -> Result<Commit> {
        if !self.identity().is_gm {
            return Err(RuntimeError::GmOnly {
                operation: "record_attack_result",
            });
        }
        self.submit(id, Step::WaitingForAttackResult, vec![
            Mutation::SetAttackResult { result: outcome },
        ])
        .await
    }

    /// Enters manually rolled attack damage.
    pub async fn submit_damage(&self, id: &MessageId, parts: Vec<DamagePart>) -> Result<Commit> {
        self.submit(id, Step::WaitingForAttackDamageRoll, vec![
            Mutation::SetDamage { parts },
        ])
        .await
    }

    /// Records a save rolled elsewhere. Duplicate saves are ignored; saves
    /// of actors that are not targets are rejected.
    pub async fn submit_save(&self, id: &MessageId, save: SaveEntry) -> Result<Commit> {
        let engine = self.engine();
        let Some((_, record)) = engine.bridge.load(id).await? else {
            return Err(RuntimeError::RecordNotFound { id: id.clone() });
        };
        if !record.target_uuids.contains(&save.actor) {
            return Err(RuntimeError::NotATarget {
                id: id.clone(),
                actor: save.actor,
            });
        }
        let commit = engine
            .bridge
            .mutate(id, Precondition::Any, vec![Mutation::AddSave { save }])
            .await?;
        if commit.is_applied() {
            self.request_step(id).await?;
        }
        Ok(commit)
    }

    /// Rolls the pending save of `actor` with its sheet bonus and records it.
    ///
    /// Returns `None` when `actor` owes no save on this record.
    pub async fn roll_save(&self, id: &MessageId, actor: &EntityRef) -> Result<Option<SaveEntry>> {
        let engine = self.engine();
        let Some((_, record)) = engine.bridge.load(id).await? else {
            return Err(RuntimeError::RecordNotFound { id: id.clone() });
        };
        if !record.target_uuids.contains(actor) || record.save_for(actor).is_some() {
            return Ok(None);
        }
        let profile = self.resolve_action(&record.item_ref).await?;
        let Some(save) = profile.phase(record.application_type).save else {
            return Ok(None);
        };

        let bonus = engine
            .services
            .entities
            .actor(actor)
            .await
            .map(|sheet| sheet.save_bonus(&save.ability))
            .unwrap_or_default();
        let roll = engine
            .services
            .rolls
            .roll_save(&SaveRollRequest {
                actor: actor.clone(),
                ability: save.ability,
                dc: save.dc,
                bonus,
            })
            .await?;

        let entry = SaveEntry {
            actor: actor.clone(),
            roll,
        };
        self.submit_save(id, entry.clone()).await?;
        Ok(Some(entry))
    }

    /// Deletes the activation, abandoning it if it is still running.
    pub async fn delete(&self, id: &MessageId) -> Result<bool> {
        self.engine().bridge.delete(id).await
    }

    /// Stops the background workers of this client.
    pub fn shutdown(&self) {
        for worker in &self.inner.workers {
            worker.abort();
        }
        debug!(target: "activation::client", client = %self.identity().user, "client shut down");
    }

    async fn submit(&self, id: &MessageId, state: Step, mutations: Vec<Mutation>) -> Result<Commit> {
        let commit = self
            .engine()
            .bridge
            .mutate(id, Precondition::in_state(Some(state.into())), mutations)
            .await?;
        match &commit {
            Commit::Applied { .. } => {
                self.request_step(id).await?;
            }
            Commit::Stale => {
                warn!(
                    target: "activation::client",
                    record = %id,
                    expected = %state,
                    "input arrived after the record moved on"
                );
            }
            Commit::Unchanged { .. } | Commit::Missing => {}
        }
        Ok(commit)
    }
}

/// Builder for [`ActivationClient`].
pub struct ClientBuilder {
    identity: Option<ClientIdentity>,
    store: Option<Arc<dyn DocumentStore>>,
    remote: Option<Arc<dyn RemoteChannel>>,
    services: Option<Services>,
    extensions: ExtensionRegistry,
    config: RuntimeConfig,
    rpc_inbox: Option<RpcInbox>,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            identity: None,
            store: None,
            remote: None,
            services: None,
            extensions: ExtensionRegistry::default(),
            config: RuntimeConfig::default(),
            rpc_inbox: None,
        }
    }

    pub fn identity(mut self, identity: ClientIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Channel towards the GM. Player clients without one cannot forward.
    pub fn remote(mut self, remote: Arc<dyn RemoteChannel>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.services = Some(services);
        self
    }

    pub fn extensions(mut self, extensions: ExtensionRegistry) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Inbox of forwarded calls; only meaningful on the GM client.
    pub fn rpc_inbox(mut self, inbox: RpcInbox) -> Self {
        self.rpc_inbox = Some(inbox);
        self
    }

    /// Wires the engine and spawns its workers.
    pub async fn build(self) -> Result<ActivationClient> {
        let identity = self.identity.ok_or(RuntimeError::MissingComponent {
            component: "identity",
        })?;
        let store = self.store.ok_or(RuntimeError::MissingComponent {
            component: "store",
        })?;
        let services = self.services.ok_or(RuntimeError::MissingComponent {
            component: "services",
        })?;

        let events = EventBus::with_capacity(self.config.event_buffer_size);
        let changes = store.subscribe();
        let bridge = Arc::new(ReplicationBridge::new(
            identity.clone(),
            store,
            self.remote,
            events.clone(),
            &self.config,
        ));
        let resolver = Resolver::new(
            Arc::clone(&bridge),
            services.clone(),
            self.extensions,
            self.config.rules.clone(),
            events.clone(),
        );
        let engine = Arc::new(Engine {
            bridge,
            resolver,
            scheduler: StepScheduler::new(self.config.max_chain_steps),
            services,
            events,
            config: self.config,
        });

        let mut workers = Vec::with_capacity(2);
        let sync = SyncWorker::new(Arc::clone(&engine), changes);
        workers.push(tokio::spawn(sync.run()));

        match self.rpc_inbox {
            Some(inbox) if identity.is_gm => {
                let rpc = RpcWorker::new(Arc::clone(&engine), inbox);
                workers.push(tokio::spawn(rpc.run()));
            }
            Some(_) => {
                warn!(
                    target: "activation::client",
                    client = %identity.user,
                    "ignoring rpc inbox on a player client"
                );
            }
            None => {}
        }

        info!(
            target: "activation::client",
            client = %identity.user,
            gm = identity.is_gm,
            "client ready"
        );
        Ok(ActivationClient {
            inner: Arc::new(ClientInner { engine, workers }),
        })
    }
}
