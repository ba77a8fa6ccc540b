//! Contract for the shared, replicated message store.

use async_trait::async_trait;
use tokio::sync::broadcast;

use activation_core::{ClientIdentity, Message, MessageId};

use super::Result;

/// Change notification delivered to every client.
#[derive(Clone, Debug)]
pub enum StoreEvent {
    Created {
        id: MessageId,
        revision: u64,
        mirror: bool,
    },
    Updated {
        id: MessageId,
        revision: u64,
        mirror: bool,
    },
    /// Carries the last replicated copy so observers can clean up after it.
    Deleted { message: Message },
}

impl StoreEvent {
    pub fn id(&self) -> &MessageId {
        match self {
            StoreEvent::Created { id, .. } | StoreEvent::Updated { id, .. } => id,
            StoreEvent::Deleted { message } => &message.id,
        }
    }

    pub fn is_mirror(&self) -> bool {
        match self {
            StoreEvent::Created { mirror, .. } | StoreEvent::Updated { mirror, .. } => *mirror,
            StoreEvent::Deleted { message } => message.is_mirror(),
        }
    }
}

/// Shared message store.
///
/// Writes are permission checked: only the message author or a GM may write
/// or delete a message. `write` is optimistic: the message must carry the
/// revision it was read at, and the store bumps it by one on success.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores a new message, assigning its id and revision 1.
    async fn create(&self, writer: &ClientIdentity, message: Message) -> Result<Message>;

    async fn load(&self, id: &MessageId) -> Result<Option<Message>>;

    /// Replaces a message; returns the new revision.
    async fn write(&self, writer: &ClientIdentity, message: Message) -> Result<u64>;

    /// Removes a message; returns the removed copy if it existed.
    async fn delete(&self, writer: &ClientIdentity, id: &MessageId) -> Result<Option<Message>>;

    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Returns true if `writer` may write `message`.
pub fn may_write(writer: &ClientIdentity, message: &Message) -> bool {
    writer.is_gm || writer.user == message.author
}
