//! Shared state of one connected client.
//!
//! The façade and the background workers hold the same [`Engine`]; every
//! step request, whatever its source, goes through [`Engine::step`] so the
//! scheduler sees all of them.

use std::sync::Arc;

use activation_core::{ClientIdentity, MessageId};
use tracing::debug;

use crate::api::Result;
use crate::bridge::ReplicationBridge;
use crate::config::RuntimeConfig;
use crate::events::EventBus;
use crate::resolver::Resolver;
use crate::scheduler::{Scheduled, StepScheduler};
use crate::services::Services;

pub(crate) struct Engine {
    pub bridge: Arc<ReplicationBridge>,
    pub resolver: Resolver,
    pub scheduler: StepScheduler,
    pub services: Services,
    pub events: EventBus,
    pub config: RuntimeConfig,
}

impl Engine {
    pub fn identity(&self) -> &ClientIdentity {
        self.bridge.identity()
    }

    /// Runs the local step loop for `id` under the scheduler.
    pub async fn step(&self, id: &MessageId) -> Result<Scheduled> {
        let resolver = &self.resolver;
        self.scheduler
            .request_step(id, move || resolver.step(id))
            .await
    }

    /// Fire-and-forget variant used by change notifications.
    pub fn spawn_step(self: &Arc<Self>, id: MessageId) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine.step(&id).await {
                debug!(
                    target: "activation::scheduler",
                    record = %id,
                    error = %err,
                    "background step failed"
                );
            }
        });
    }
}
