use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use activation_core::Message;

use crate::engine::Engine;
use crate::events::{Event, LifecycleEvent};
use crate::store::StoreEvent;

/// Reacts to replicated changes made by any client.
pub(crate) struct SyncWorker {
    engine: Arc<Engine>,
    changes: broadcast::Receiver<StoreEvent>,
}

impl SyncWorker {
    pub fn new(engine: Arc<Engine>, changes: broadcast::Receiver<StoreEvent>) -> Self {
        Self { engine, changes }
    }

    pub async fn run(mut self) {
        debug!(
            target: "activation::sync",
            client = %self.engine.identity().user,
            "sync worker started"
        );
        loop {
            match self.changes.recv().await {
                Ok(event) => self.handle(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        target: "activation::sync",
                        client = %self.engine.identity().user,
                        skipped,
                        "change feed lagged"
                    );
                }
                Err(RecvError::Closed) => {
                    info!(target: "activation::sync", "change feed closed, stopping");
                    break;
                }
            }
        }
    }

    async fn handle(&self, event: StoreEvent) {
        match event {
            StoreEvent::Created { id, mirror, .. } | StoreEvent::Updated { id, mirror, .. } => {
                if !mirror && self.engine.config.auto_step {
                    self.engine.spawn_step(id);
                }
            }
            StoreEvent::Deleted { message } => self.abandon(message).await,
        }
    }

    /// Drops local bookkeeping; the GM also removes what the activation left
    /// behind. Unfinished activations lose every created effect, finished
    /// ones only the transient effects still on record.
    async fn abandon(&self, message: Message) {
        self.engine.scheduler.forget(&message.id);
        if message.is_mirror() {
            return;
        }
        self.engine
            .events
            .publish(Event::Lifecycle(LifecycleEvent::Deleted {
                record: message.id.clone(),
            }));
        if !self.engine.identity().is_gm {
            return;
        }

        match message.record() {
            Ok(record) => {
                let leftovers = if record.finalized {
                    &record.transient_effect_uuids
                } else {
                    &record.created_effect_uuids
                };
                if !leftovers.is_empty()
                    && let Err(err) = self.engine.services.effects.remove_effects(leftovers).await
                {
                    warn!(
                        target: "activation::sync",
                        record = %message.id,
                        finalized = record.finalized,
                        error = %err,
                        "failed to remove effects of deleted activation"
                    );
                }
            }
            Err(err) => {
                warn!(
                    target: "activation::sync",
                    record = %message.id,
                    error = %err,
                    "deleted message has no readable record"
                );
            }
        }
        self.engine.bridge.delete_mirrors(&message).await;
        info!(target: "activation::sync", record = %message.id, "activation message removed");
    }
}
