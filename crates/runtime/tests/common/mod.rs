//! Shared fixtures: one in-memory table with a GM and player clients.
#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use activation_content::Catalog;
use activation_core::{ActivationRecord, ClientIdentity, MessageId};
use activation_runtime::{
    ActivationClient, DocumentStore, ExtensionRegistry, InMemoryStore, LocalRpcHub,
    MemoryServices, RuntimeConfig,
};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn catalog() -> Catalog {
    Catalog::embedded().expect("embedded catalog loads")
}

pub struct Table {
    pub store: Arc<InMemoryStore>,
    pub hub: LocalRpcHub,
    /// World services; also the GM's dice and prompts.
    pub world: MemoryServices,
    pub gm: ActivationClient,
    pub config: RuntimeConfig,
}

impl Table {
    pub async fn new(config: RuntimeConfig) -> Self {
        Self::with_world(config, MemoryServices::new(catalog()), ExtensionRegistry::default())
            .await
    }

    pub async fn with_world(
        config: RuntimeConfig,
        world: MemoryServices,
        extensions: ExtensionRegistry,
    ) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let (hub, inbox) = LocalRpcHub::channel(config.rpc_buffer_size);
        let gm = ActivationClient::builder()
            .identity(ClientIdentity::gm("gm"))
            .store(store.clone() as Arc<dyn DocumentStore>)
            .services(world.services())
            .extensions(extensions)
            .config(config.clone())
            .rpc_inbox(inbox)
            .build()
            .await
            .expect("gm client builds");

        Self {
            store,
            hub,
            world,
            gm,
            config,
        }
    }

    /// Connects a player with their own dice and prompts.
    pub async fn player(&self, user: &str) -> (ActivationClient, MemoryServices) {
        let services = self.world.for_other_client();
        let client = ActivationClient::builder()
            .identity(ClientIdentity::player(user))
            .store(self.store.clone() as Arc<dyn DocumentStore>)
            .remote(Arc::new(self.hub.clone()))
            .services(services.services())
            .config(self.config.clone())
            .build()
            .await
            .expect("player client builds");
        (client, services)
    }
}

/// Polls until `check` accepts the record or the wait runs out.
pub async fn wait_for<F>(client: &ActivationClient, id: &MessageId, check: F) -> ActivationRecord
where
    F: Fn(&ActivationRecord) -> bool,
{
    let poll = async {
        loop {
            if let Some(record) = client.record(id).await.expect("record loads")
                && check(&record)
            {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(WAIT, poll)
        .await
        .expect("record reached the expected state in time")
}

pub async fn wait_until<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(WAIT, poll)
        .await
        .expect("condition held in time");
}

pub fn manual_config() -> RuntimeConfig {
    RuntimeConfig::default().with_auto_step(false)
}
