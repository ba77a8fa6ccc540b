//! Runs a few activations between a GM and a player on one in-memory table.
//!
//! Usage: `activation-sim [attack|fireball|hold-person]...` (all by default).
//! Rules toggles are read from the environment, see `RuntimeConfig::from_env`.
use std::sync::Arc;
use std::time::Duration;

use activation_content::Catalog;
use activation_core::{ActivationRecord, ApplicationType, ClientIdentity, EntityRef, MessageId};
use activation_runtime::{
    ActivationClient, ActivationRequest, ConditionTrigger, DocumentStore, Event, FixedTemplates,
    InMemoryStore, LifecycleEvent, LocalRpcHub, MemoryServices, RecordingEffects, RuntimeConfig,
    Topic,
};
use anyhow::{Context, Result, bail};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();
    setup_logging();

    let config = RuntimeConfig::from_env();
    let table = Table::open(config).await?;

    let mut scenarios: Vec<String> = std::env::args().skip(1).collect();
    if scenarios.is_empty() {
        scenarios = vec!["attack".into(), "fireball".into(), "hold-person".into()];
    }

    for scenario in &scenarios {
        info!(target: "activation::sim", scenario = %scenario, "running scenario");
        match scenario.as_str() {
            "attack" => table.attack().await?,
            "fireball" => table.fireball().await?,
            "hold-person" => table.hold_person().await?,
            other => bail!("unknown scenario {other}"),
        }
    }

    table.shutdown();
    Ok(())
}

fn setup_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

struct Table {
    store: Arc<InMemoryStore>,
    world: MemoryServices,
    gm: ActivationClient,
    alice: ActivationClient,
    alice_services: MemoryServices,
}

impl Table {
    async fn open(config: RuntimeConfig) -> Result<Self> {
        let catalog = Catalog::embedded().context("loading embedded catalog")?;
        let store = Arc::new(InMemoryStore::new());
        let (hub, inbox) = LocalRpcHub::channel(config.rpc_buffer_size);

        let goblin = EntityRef::from("Actor.goblin");
        let ogre = EntityRef::from("Actor.ogre");
        let world = MemoryServices::new(catalog)
            .with_templates(FixedTemplates::covering([goblin, ogre]))
            .with_effects(RecordingEffects::new().with_master_effects());

        let gm = ActivationClient::builder()
            .identity(ClientIdentity::gm("gm"))
            .store(store.clone() as Arc<dyn DocumentStore>)
            .services(world.services())
            .config(config.clone())
            .rpc_inbox(inbox)
            .build()
            .await?;

        let alice_services = world.for_other_client();
        let alice = ActivationClient::builder()
            .identity(ClientIdentity::player("alice"))
            .store(store.clone() as Arc<dyn DocumentStore>)
            .remote(Arc::new(hub))
            .services(alice_services.services())
            .config(config)
            .build()
            .await?;

        Ok(Self {
            store,
            world,
            gm,
            alice,
            alice_services,
        })
    }

    /// Alice swings at the goblin.
    async fn attack(&self) -> Result<()> {
        self.alice_services.prompts.select("alice", ["Actor.goblin"]);
        self.alice_services.dice.push_d20([14]);
        self.alice_services.dice.push_damage([6]);

        let completed = self.gm.subscribe(Topic::Lifecycle);
        let id = self
            .alice
            .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
            .await?;

        let record = self.await_completion(completed, &id).await?;
        let resolved = record
            .as_ref()
            .and_then(|record| record.attack.as_ref())
            .and_then(|attack| attack.result);
        if record.is_some() && resolved.is_none() {
            warn!(
                target: "activation::sim",
                record = %id,
                "attack result left to the GM; set ACTIVATION_AUTO_RESOLVE_ATTACKS=true"
            );
        }
        self.report(&id, &record);
        Ok(())
    }

    /// The GM drops a fireball on the goblin and the ogre.
    async fn fireball(&self) -> Result<()> {
        self.world.dice.push_damage([24]);
        self.world.dice.push_d20([17, 4]);

        let completed = self.gm.subscribe(Topic::Lifecycle);
        let id = self
            .gm
            .activate(ActivationRequest::new("Item.fireball", "Actor.wizard"))
            .await?;

        let record = self.await_completion(completed, &id).await?;
        self.report(&id, &record);
        Ok(())
    }

    /// Hold Person on the ogre, then one end-of-turn save.
    async fn hold_person(&self) -> Result<()> {
        self.world.dice.push_d20([2]);

        let completed = self.gm.subscribe(Topic::Lifecycle);
        let id = self
            .gm
            .activate(
                ActivationRequest::new("Item.hold-person", "Actor.wizard")
                    .with_targets(["Actor.ogre"]),
            )
            .await?;
        let record = self.await_completion(completed, &id).await?;
        self.report(&id, &record);
        let Some(record) = record else {
            return Ok(());
        };

        let (Some(master), Some(source)) = (
            record.master_effect_uuid.clone(),
            record.created_effect_uuids.first().cloned(),
        ) else {
            info!(target: "activation::sim", record = %id, "ogre resisted, nothing to repeat");
            return Ok(());
        };

        self.world.dice.push_d20([16]);
        let completed = self.gm.subscribe(Topic::Lifecycle);
        let trigger = ConditionTrigger::new(
            "Item.hold-person",
            "Actor.wizard",
            "turnEnd",
            ApplicationType::Overtime,
        )
        .with_targets(record.effective_target_uuids.clone())
        .from_effect(source, Some(master));
        let follow_up = self.gm.trigger_condition(trigger).await?;

        let record = self.await_completion(completed, &follow_up).await?;
        self.report(&follow_up, &record);
        Ok(())
    }

    async fn await_completion(
        &self,
        mut lifecycle: broadcast::Receiver<Event>,
        id: &MessageId,
    ) -> Result<Option<ActivationRecord>> {
        let wait = async {
            loop {
                match lifecycle.recv().await {
                    Ok(Event::Lifecycle(LifecycleEvent::Completed { record })) if &record == id => {
                        return Ok(());
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => bail!("event bus closed"),
                }
            }
        };

        match tokio::time::timeout(COMPLETION_TIMEOUT, wait).await {
            Ok(result) => result?,
            Err(_) => {
                let state = self
                    .gm
                    .record(id)
                    .await?
                    .and_then(|record| record.state)
                    .map(|state| state.to_string());
                bail!("activation {id} did not complete, parked in {state:?}");
            }
        }

        Ok(self.gm.record(id).await?)
    }

    fn report(&self, id: &MessageId, record: &Option<ActivationRecord>) {
        let Some(record) = record else {
            info!(target: "activation::sim", record = %id, "activation completed and deleted");
            return;
        };
        info!(
            target: "activation::sim",
            record = %id,
            item = %record.item_ref,
            application = %record.application_type,
            targets = ?record.target_uuids,
            effective = ?record.effective_target_uuids,
            saves = record.saves.len(),
            damage = record.damage.as_ref().map(|parts| parts.iter().map(|p| p.total).sum::<i32>()),
            created_effects = record.created_effect_uuids.len(),
            "activation completed"
        );
        info!(
            target: "activation::sim",
            applications = self.world.damage.applications().len(),
            effect_requests = self.world.effects.requests().len(),
            messages = self.store.len(),
            "world so far"
        );
    }

    fn shutdown(&self) {
        self.alice.shutdown();
        self.gm.shutdown();
    }
}
