//! Per-topic broadcast channels.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::{LifecycleEvent, Notice};

/// Event categories a subscriber can pick.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Activation creation, state changes, completion, deletion
    Lifecycle,
    /// Localized warnings and errors for the local user
    Notice,
}

/// An event together with the topic it is routed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Lifecycle(LifecycleEvent),
    Notice(Notice),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Lifecycle(_) => Topic::Lifecycle,
            Event::Notice(_) => Topic::Notice,
        }
    }
}

struct Channels {
    lifecycle: broadcast::Sender<Event>,
    notice: broadcast::Sender<Event>,
}

/// Local event bus of one client.
///
/// Events are local observations and are never replicated; other clients
/// learn about changes through the store.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// `capacity` applies to each topic.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(Channels {
                lifecycle: broadcast::channel(capacity).0,
                notice: broadcast::channel(capacity).0,
            }),
        }
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Lifecycle => &self.channels.lifecycle,
            Topic::Notice => &self.channels.notice,
        }
    }

    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.sender(topic).send(event).is_err() {
            tracing::trace!(target: "activation::events", ?topic, "event dropped, no subscribers");
        }
    }

    /// Receives events of `topic` published from now on.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.sender(topic).subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NoticeKey, NoticeLevel};
    use activation_core::{MessageId, UserId};

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = EventBus::with_capacity(4);
        let mut notices = bus.subscribe(Topic::Notice);
        let mut lifecycle = bus.subscribe(Topic::Lifecycle);

        bus.publish(Event::Notice(Notice {
            level: NoticeLevel::Warning,
            key: NoticeKey::NoTargets,
            record: MessageId::from("Message.1"),
            user: UserId::from("alice"),
        }));

        let event = notices.recv().await.unwrap();
        assert!(matches!(event, Event::Notice(ref n) if n.key == NoticeKey::NoTargets));
        assert!(lifecycle.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::default();
        bus.publish(Event::Lifecycle(LifecycleEvent::Deleted {
            record: MessageId::from("Message.1"),
        }));
    }
}
