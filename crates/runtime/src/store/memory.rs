//! In-memory DocumentStore implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use activation_core::{ClientIdentity, Message, MessageId};

use super::traits::may_write;
use super::{DocumentStore, Result, StoreError, StoreEvent};

/// In-memory implementation of DocumentStore.
///
/// Shared by every client of one process; stands in for the replicated
/// document database.
pub struct InMemoryStore {
    messages: RwLock<HashMap<MessageId, Message>>,
    next_id: AtomicU64,
    changes: broadcast::Sender<StoreEvent>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a store whose change feed buffers `capacity` notifications.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            changes: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.read().map(|messages| messages.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, event: StoreEvent) {
        if self.changes.send(event).is_err() {
            tracing::trace!("No store subscribers");
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create(&self, writer: &ClientIdentity, mut message: Message) -> Result<Message> {
        if !may_write(writer, &message) {
            return Err(StoreError::PermissionDenied {
                id: message.id,
                user: writer.user.clone(),
            });
        }

        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed);
        message.id = MessageId::new(format!("Message.{sequence}"));
        message.revision = 1;

        {
            let mut messages = self
                .messages
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            messages.insert(message.id.clone(), message.clone());
        }

        self.notify(StoreEvent::Created {
            id: message.id.clone(),
            revision: message.revision,
            mirror: message.is_mirror(),
        });
        Ok(message)
    }

    async fn load(&self, id: &MessageId) -> Result<Option<Message>> {
        let messages = self
            .messages
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(messages.get(id).cloned())
    }

    async fn write(&self, writer: &ClientIdentity, mut message: Message) -> Result<u64> {
        let revision = {
            let mut messages = self
                .messages
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            let current = messages
                .get(&message.id)
                .ok_or_else(|| StoreError::NotFound {
                    id: message.id.clone(),
                })?;

            // Authorship is fixed at creation; check against the stored copy.
            if !may_write(writer, current) {
                return Err(StoreError::PermissionDenied {
                    id: message.id,
                    user: writer.user.clone(),
                });
            }
            if current.revision != message.revision {
                return Err(StoreError::Conflict {
                    id: message.id,
                    expected: message.revision,
                    actual: current.revision,
                });
            }

            message.author = current.author.clone();
            message.originator = current.originator.clone();
            message.mirror_of = current.mirror_of.clone();
            message.revision += 1;
            let revision = message.revision;
            messages.insert(message.id.clone(), message.clone());
            revision
        };

        self.notify(StoreEvent::Updated {
            id: message.id.clone(),
            revision,
            mirror: message.is_mirror(),
        });
        Ok(revision)
    }

    async fn delete(&self, writer: &ClientIdentity, id: &MessageId) -> Result<Option<Message>> {
        let removed = {
            let mut messages = self
                .messages
                .write()
                .map_err(|_| StoreError::LockPoisoned)?;
            match messages.get(id) {
                None => return Ok(None),
                Some(current) if !may_write(writer, current) => {
                    return Err(StoreError::PermissionDenied {
                        id: id.clone(),
                        user: writer.user.clone(),
                    });
                }
                Some(_) => messages.remove(id),
            }
        };

        if let Some(message) = &removed {
            self.notify(StoreEvent::Deleted {
                message: message.clone(),
            });
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.changes.subscribe()
    }
}
