//! Replication of record mutations.
//!
//! [`ReplicationBridge`] is the only writer of activation messages on a
//! client. A client allowed to write a message (its author, or the GM)
//! applies mutations to a fresh copy and writes it back with an optimistic
//! revision check, retrying on conflict. Everyone else forwards the same
//! logical mutations to the GM and waits until the resulting revision has
//! replicated back.
//!
//! Mirror copies are rewritten after every successful primary write.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use activation_core::{
    ActivationRecord, ClientIdentity, Message, MessageId, Mutation, StateName,
};

use crate::api::{MirrorMode, Result, RuntimeError};
use crate::config::RuntimeConfig;
use crate::events::{Event, EventBus, LifecycleEvent};
use crate::rpc::{RemoteCall, RemoteChannel, RemoteReply};
use crate::store::{DocumentStore, StoreError, may_write};

/// Condition a write is conditional on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Precondition {
    #[default]
    Any,
    /// The record must still be in this state.
    State { state: Option<StateName> },
}

impl Precondition {
    pub fn in_state(state: Option<StateName>) -> Self {
        Precondition::State { state }
    }

    pub fn holds(&self, record: &ActivationRecord) -> bool {
        match self {
            Precondition::Any => true,
            Precondition::State { state } => record.state == *state,
        }
    }
}

/// Result of [`ReplicationBridge::mutate`].
#[derive(Clone, Debug, PartialEq)]
pub enum Commit {
    Applied {
        record: ActivationRecord,
        revision: u64,
    },
    /// The mutations did not change anything.
    Unchanged { record: ActivationRecord },
    /// The precondition no longer held.
    Stale,
    Missing,
}

impl Commit {
    pub fn is_applied(&self) -> bool {
        matches!(self, Commit::Applied { .. })
    }

    pub fn record(&self) -> Option<&ActivationRecord> {
        match self {
            Commit::Applied { record, .. } | Commit::Unchanged { record } => Some(record),
            Commit::Stale | Commit::Missing => None,
        }
    }
}

pub struct ReplicationBridge {
    identity: ClientIdentity,
    store: Arc<dyn DocumentStore>,
    remote: Option<Arc<dyn RemoteChannel>>,
    events: EventBus,
    propagation_timeout: Duration,
    max_write_retries: usize,
}

impl ReplicationBridge {
    pub fn new(
        identity: ClientIdentity,
        store: Arc<dyn DocumentStore>,
        remote: Option<Arc<dyn RemoteChannel>>,
        events: EventBus,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            identity,
            store,
            remote,
            events,
            propagation_timeout: config.propagation_timeout,
            max_write_retries: config.max_write_retries.max(1),
        }
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn can_write(&self, message: &Message) -> bool {
        may_write(&self.identity, message)
    }

    /// Loads a message and decodes its record.
    pub async fn load(&self, id: &MessageId) -> Result<Option<(Message, ActivationRecord)>> {
        let Some(message) = self.store.load(id).await? else {
            return Ok(None);
        };
        let record = message.record()?;
        Ok(Some((message, record)))
    }

    /// Stores a new primary message, then its mirrors.
    pub async fn create(&self, message: Message, mirrors: MirrorMode) -> Result<Message> {
        let primary = self.store.create(&self.identity, message).await?;
        debug!(
            target: "activation::bridge",
            record = %primary.id,
            client = %self.identity.user,
            "activation created"
        );

        let count = [mirrors.includes_gm(), mirrors.includes_players()]
            .into_iter()
            .filter(|wanted| *wanted)
            .count();
        let mut mirror_ids = Vec::with_capacity(count);
        for _ in 0..count {
            let copy = primary.mirror(MessageId::from("mirror"), primary.author.clone());
            mirror_ids.push(self.store.create(&self.identity, copy).await?.id);
        }
        if mirror_ids.is_empty() {
            return Ok(primary);
        }

        self.attach_mirrors(&primary.id, mirror_ids).await
    }

    async fn attach_mirrors(&self, id: &MessageId, mirror_ids: Vec<MessageId>) -> Result<Message> {
        for _ in 0..self.max_write_retries {
            let mut message = self
                .store
                .load(id)
                .await?
                .ok_or_else(|| RuntimeError::RecordNotFound { id: id.clone() })?;
            message.mirrors = mirror_ids.clone();
            match self.store.write(&self.identity, message.clone()).await {
                Ok(revision) => {
                    message.revision = revision;
                    self.sync_mirrors(&message).await;
                    return Ok(message);
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(RuntimeError::WriteContention {
            id: id.clone(),
            attempts: self.max_write_retries,
        })
    }

    /// Applies `mutations` to the record if `precondition` holds.
    ///
    /// Writes directly when this client may write the message, otherwise
    /// forwards to the GM and waits for the result to replicate back.
    pub async fn mutate(
        &self,
        id: &MessageId,
        precondition: Precondition,
        mutations: Vec<Mutation>,
    ) -> Result<Commit> {
        let Some(message) = self.store.load(id).await? else {
            return Ok(Commit::Missing);
        };

        if self.can_write(&message) {
            self.write_local(message, &precondition, &mutations).await
        } else {
            self.forward(id, precondition, mutations).await
        }
    }

    async fn write_local(
        &self,
        mut message: Message,
        precondition: &Precondition,
        mutations: &[Mutation],
    ) -> Result<Commit> {
        let id = message.id.clone();
        for attempt in 1..=self.max_write_retries {
            let mut record = message.record()?;
            if !precondition.holds(&record) {
                trace!(target: "activation::bridge", record = %id, "precondition no longer holds");
                return Ok(Commit::Stale);
            }

            let from = record.state.clone();
            if !record.apply_all(mutations) {
                return Ok(Commit::Unchanged { record });
            }
            message.set_record(&record)?;

            match self.store.write(&self.identity, message.clone()).await {
                Ok(revision) => {
                    message.revision = revision;
                    trace!(
                        target: "activation::bridge",
                        record = %id,
                        revision,
                        state = ?record.state,
                        "record written"
                    );
                    if from != record.state {
                        self.events
                            .publish(Event::Lifecycle(LifecycleEvent::StateChanged {
                                record: id.clone(),
                                from,
                                to: record.state.clone(),
                            }));
                    }
                    self.sync_mirrors(&message).await;
                    return Ok(Commit::Applied { record, revision });
                }
                Err(StoreError::Conflict { actual, .. }) => {
                    debug!(
                        target: "activation::bridge",
                        record = %id,
                        attempt,
                        actual,
                        "write conflict, retrying"
                    );
                    match self.store.load(&id).await? {
                        Some(fresh) => message = fresh,
                        None => return Ok(Commit::Missing),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RuntimeError::WriteContention {
            id,
            attempts: self.max_write_retries,
        })
    }

    async fn forward(
        &self,
        id: &MessageId,
        precondition: Precondition,
        mutations: Vec<Mutation>,
    ) -> Result<Commit> {
        let remote = self.remote.as_ref().ok_or(RuntimeError::RemoteUnavailable)?;
        debug!(
            target: "activation::bridge",
            record = %id,
            client = %self.identity.user,
            mutations = mutations.len(),
            "forwarding mutations to GM"
        );

        let reply = remote
            .call(RemoteCall::Mutate {
                record: id.clone(),
                precondition,
                mutations,
                requested_by: self.identity.user.clone(),
            })
            .await?;

        match reply {
            RemoteReply::Committed { revision } => {
                self.wait_for_revision(id, revision).await?;
                match self.load(id).await? {
                    Some((_, record)) => Ok(Commit::Applied { record, revision }),
                    None => Ok(Commit::Missing),
                }
            }
            RemoteReply::Unchanged => match self.load(id).await? {
                Some((_, record)) => Ok(Commit::Unchanged { record }),
                None => Ok(Commit::Missing),
            },
            RemoteReply::Stale => Ok(Commit::Stale),
            RemoteReply::Missing => Ok(Commit::Missing),
            RemoteReply::Failed { reason } => Err(RuntimeError::Remote { reason }),
            reply @ (RemoteReply::Stepped | RemoteReply::Deleted) => {
                Err(RuntimeError::UnexpectedReply {
                    call: "mutate",
                    reply,
                })
            }
        }
    }

    /// Waits until the local replica of `id` reaches `revision`.
    ///
    /// A deleted record counts as replicated.
    pub async fn wait_for_revision(&self, id: &MessageId, revision: u64) -> Result<()> {
        let mut changes = self.store.subscribe();
        let deadline = Instant::now() + self.propagation_timeout;

        loop {
            match self.store.load(id).await? {
                Some(message) if message.revision < revision => {}
                _ => return Ok(()),
            }

            match tokio::time::timeout_at(deadline, changes.recv()).await {
                Err(_) => {
                    return Err(RuntimeError::PropagationTimeout {
                        id: id.clone(),
                        revision,
                        timeout: self.propagation_timeout,
                    });
                }
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {}
                Ok(Err(RecvError::Closed)) => return Err(RuntimeError::ChangeFeedClosed),
            }
        }
    }

    /// Asks the GM client to run its scheduler for `id`.
    pub async fn request_remote_step(&self, id: &MessageId) -> Result<()> {
        let remote = self.remote.as_ref().ok_or(RuntimeError::RemoteUnavailable)?;
        let reply = remote
            .call(RemoteCall::RequestStep {
                record: id.clone(),
                requested_by: self.identity.user.clone(),
            })
            .await?;

        match reply {
            RemoteReply::Stepped | RemoteReply::Missing => Ok(()),
            RemoteReply::Failed { reason } => Err(RuntimeError::Remote { reason }),
            reply => Err(RuntimeError::UnexpectedReply {
                call: "request_step",
                reply,
            }),
        }
    }

    /// Deletes a primary message; returns false if it was already gone.
    pub async fn delete(&self, id: &MessageId) -> Result<bool> {
        let Some(message) = self.store.load(id).await? else {
            return Ok(false);
        };

        if self.can_write(&message) {
            return Ok(self.store.delete(&self.identity, id).await?.is_some());
        }

        let remote = self.remote.as_ref().ok_or(RuntimeError::RemoteUnavailable)?;
        let reply = remote
            .call(RemoteCall::Delete {
                record: id.clone(),
                requested_by: self.identity.user.clone(),
            })
            .await?;
        match reply {
            RemoteReply::Deleted => Ok(true),
            RemoteReply::Missing => Ok(false),
            RemoteReply::Failed { reason } => Err(RuntimeError::Remote { reason }),
            reply => Err(RuntimeError::UnexpectedReply {
                call: "delete",
                reply,
            }),
        }
    }

    /// Deletes the mirrors of a removed primary.
    pub async fn delete_mirrors(&self, primary: &Message) {
        for mirror in &primary.mirrors {
            if let Err(err) = self.store.delete(&self.identity, mirror).await {
                warn!(
                    target: "activation::bridge",
                    record = %primary.id,
                    mirror = %mirror,
                    error = %err,
                    "failed to delete mirror"
                );
            }
        }
    }

    /// Copies the primary payload into every mirror. Best effort.
    async fn sync_mirrors(&self, primary: &Message) {
        for mirror_id in &primary.mirrors {
            let result = async {
                let Some(mut mirror) = self.store.load(mirror_id).await? else {
                    return Ok::<_, StoreError>(());
                };
                mirror.payload = primary.payload.clone();
                self.store.write(&self.identity, mirror).await?;
                Ok(())
            }
            .await;

            if let Err(err) = result {
                warn!(
                    target: "activation::bridge",
                    record = %primary.id,
                    mirror = %mirror_id,
                    error = %err,
                    "mirror sync failed"
                );
            }
        }
    }
}
