//! End-to-end activations across a GM and player clients sharing one store.
mod common;

use std::sync::Arc;

use activation_core::{
    ActionProfile, ActivationRecord, ApplicationType, AttackOutcome, ClientIdentity, EffectSpec,
    EntityRef, Mutation, PhaseProfile, RollResult, RulesConfig, SaveEntry, StateName, Step,
    compile_flow,
};
use activation_runtime::{
    ActivationRequest, ConditionTrigger, DocumentStore, Event, ExtensionContext, ExtensionError,
    ExtensionOutcome, ExtensionRegistry, FixedTemplates, LifecycleEvent, MemoryServices,
    MirrorMode, NoticeKey, RecordingEffects, RuntimeConfig, RuntimeError, Scheduled, StepExtension,
    StepOutcome, Topic,
};
use async_trait::async_trait;
use common::{Table, catalog, manual_config, wait_for, wait_until};

fn goblin() -> EntityRef {
    EntityRef::from("Actor.goblin")
}

fn ogre() -> EntityRef {
    EntityRef::from("Actor.ogre")
}

fn rules(edit: impl FnOnce(&mut RulesConfig)) -> RulesConfig {
    let mut rules = RulesConfig::default();
    edit(&mut rules);
    rules
}

fn in_state(record: &ActivationRecord, step: Step) -> bool {
    record.state.as_ref().is_some_and(|state| state.is(step))
}

#[tokio::test]
async fn attack_hit_resolves_end_to_end() {
    let config =
        RuntimeConfig::default().with_rules(rules(|rules| rules.auto_resolve_attacks = true));
    let table = Table::new(config).await;
    let (alice, alice_services) = table.player("alice").await;
    alice_services.prompts.select("alice", [goblin()]);
    alice_services.dice.push_d20([15]);
    alice_services.dice.push_damage([7]);

    let id = alice
        .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
        .await
        .unwrap();
    let record = wait_for(&table.gm, &id, |record| record.finalized).await;

    let attack = record.attack.as_ref().expect("attack recorded");
    assert_eq!(attack.roll.total, 20);
    assert_eq!(attack.result, Some(AttackOutcome::Hit));
    assert_eq!(record.target_uuids, vec![goblin()]);
    assert_eq!(record.effective_target_uuids, vec![goblin()]);
    assert_eq!(record.damage.as_ref().map(|parts| parts[0].total), Some(7));
    assert!(record.is_terminal());

    let applications = table.world.damage.applications();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].full, vec![goblin()]);
    assert!(applications[0].half.is_empty());
    assert_eq!(applications[0].total(), 7);
}

#[tokio::test]
async fn attack_miss_skips_damage() {
    let config =
        RuntimeConfig::default().with_rules(rules(|rules| rules.auto_resolve_attacks = true));
    let table = Table::new(config).await;
    let (alice, alice_services) = table.player("alice").await;
    alice_services.prompts.select("alice", [goblin()]);
    alice_services.dice.push_d20([1]);

    let id = alice
        .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
        .await
        .unwrap();
    let record = wait_for(&table.gm, &id, |record| record.finalized).await;

    assert_eq!(
        record.attack.as_ref().and_then(|attack| attack.result),
        Some(AttackOutcome::Miss)
    );
    assert!(record.effective_target_uuids.is_empty());
    assert!(record.damage.is_none());
    assert!(table.world.damage.applications().is_empty());
}

#[tokio::test]
async fn save_with_all_successes_halves_damage_for_savers() {
    let world = MemoryServices::new(catalog())
        .with_templates(FixedTemplates::covering([goblin(), ogre()]));
    world.dice.push_damage([28]);
    // goblin +2, ogre -1 against DC 15
    world.dice.push_d20([18, 19]);
    let table =
        Table::with_world(RuntimeConfig::default(), world, ExtensionRegistry::default()).await;

    let id = table
        .gm
        .activate(ActivationRequest::new("Item.fireball", "Actor.wizard"))
        .await
        .unwrap();
    let record = wait_for(&table.gm, &id, |record| record.finalized).await;

    assert!(record.template_uuid.is_some());
    assert_eq!(record.target_uuids, vec![goblin(), ogre()]);
    assert_eq!(record.saves.len(), 2);
    assert!(record.effective_target_uuids.is_empty());

    let applications = table.world.damage.applications();
    assert_eq!(applications.len(), 1);
    assert!(applications[0].full.is_empty());
    assert_eq!(applications[0].half, vec![goblin(), ogre()]);
    assert_eq!(applications[0].total(), 28);

    let effects = table.world.effects.requests();
    assert_eq!(effects.len(), 1);
    assert!(effects[0].effective_targets.is_empty());
}

#[tokio::test]
async fn player_requesting_gm_step_is_a_local_no_op_until_the_gm_runs_it() {
    let config = manual_config().with_rules(rules(|rules| rules.auto_resolve_attacks = true));
    let table = Table::new(config).await;
    let (alice, alice_services) = table.player("alice").await;
    alice_services.prompts.select("alice", [goblin()]);
    alice_services.dice.push_d20([19]);

    let id = alice
        .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
        .await
        .unwrap();
    let created = alice.record(&id).await.unwrap().unwrap();
    assert!(in_state(&created, Step::Idle));

    let first = alice.step_local(&id).await.unwrap();
    assert!(matches!(first, Scheduled::Executed {
        outcome: StepOutcome::Parked,
        ..
    }));
    let parked = alice.record(&id).await.unwrap().unwrap();
    assert!(in_state(&parked, Step::WaitingForAttackResult));
    assert!(parked.effective_target_uuids.is_empty());

    let revision = table.store.load(&id).await.unwrap().unwrap().revision;
    let again = alice.step_local(&id).await.unwrap();
    assert_eq!(again, Scheduled::Executed {
        transitions: 0,
        outcome: StepOutcome::Parked,
    });
    assert_eq!(table.store.load(&id).await.unwrap().unwrap().revision, revision);

    // The GM runs the resolution when asked over RPC.
    alice.request_step(&id).await.unwrap();
    let resolved = alice.record(&id).await.unwrap().unwrap();
    assert!(in_state(&resolved, Step::Idle));
    assert_eq!(resolved.effective_target_uuids, vec![goblin()]);
    assert_eq!(resolved.flow_steps.first().map(String::as_str), Some("performAttackDamageRoll"));
}

#[tokio::test]
async fn clients_without_the_required_role_leave_the_record_alone() {
    let table = Table::new(manual_config()).await;
    let (alice, alice_services) = table.player("alice").await;
    let (carol, _) = table.player("carol").await;
    alice_services.prompts.select("alice", [goblin()]);

    let id = alice
        .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
        .await
        .unwrap();
    let revision = table.store.load(&id).await.unwrap().unwrap().revision;

    // idle belongs to the author
    for client in [&carol, &table.gm] {
        let outcome = client.step_local(&id).await.unwrap();
        assert_eq!(outcome, Scheduled::Executed {
            transitions: 0,
            outcome: StepOutcome::Parked,
        });
    }
    assert_eq!(table.store.load(&id).await.unwrap().unwrap().revision, revision);

    alice.step_local(&id).await.unwrap();
    let parked = alice.record(&id).await.unwrap().unwrap();
    assert!(in_state(&parked, Step::WaitingForAttackResult));
    let revision = table.store.load(&id).await.unwrap().unwrap().revision;

    // attack results belong to the GM
    carol.step_local(&id).await.unwrap();
    alice.step_local(&id).await.unwrap();
    assert_eq!(table.store.load(&id).await.unwrap().unwrap().revision, revision);
}

#[tokio::test]
async fn gm_records_attack_result_by_hand() {
    let table = Table::new(manual_config()).await;
    let (alice, alice_services) = table.player("alice").await;
    alice_services.prompts.select("alice", [goblin()]);

    let id = alice
        .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
        .await
        .unwrap();
    alice.step_local(&id).await.unwrap();

    let err = alice
        .record_attack_result(&id, AttackOutcome::Hit)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::GmOnly { .. }));

    let commit = table
        .gm
        .record_attack_result(&id, AttackOutcome::Hit)
        .await
        .unwrap();
    assert!(commit.is_applied());

    let record = alice.record(&id).await.unwrap().unwrap();
    assert!(in_state(&record, Step::Idle));
    assert_eq!(record.effective_target_uuids, vec![goblin()]);
}

#[tokio::test]
async fn idle_drain_visits_every_flow_step_once() {
    let table = Table::new(RuntimeConfig::default()).await;
    let mut lifecycle = table.gm.subscribe(Topic::Lifecycle);
    let targets = [EntityRef::from("Actor.fighter"), EntityRef::from("Actor.wizard")];

    let id = table
        .gm
        .activate(ActivationRequest::new("Item.bless", "Actor.fighter").with_targets(targets.clone()))
        .await
        .unwrap();

    let mut visited = Vec::new();
    let drain = async {
        loop {
            match lifecycle.recv().await.expect("lifecycle events") {
                Event::Lifecycle(LifecycleEvent::StateChanged {
                    record,
                    to: Some(state),
                    ..
                }) if record == id && state != StateName::IDLE => {
                    visited.push(String::from(state));
                }
                Event::Lifecycle(LifecycleEvent::Completed { record }) if record == id => break,
                _ => {}
            }
        }
    };
    tokio::time::timeout(common::WAIT, drain)
        .await
        .expect("activation completed");

    let profile = catalog()
        .actions
        .get(&EntityRef::from("Item.bless"))
        .cloned()
        .unwrap();
    assert_eq!(visited, compile_flow(&profile, ApplicationType::Immediate));

    let record = table.gm.record(&id).await.unwrap().unwrap();
    assert!(record.flow_steps.is_empty());
    assert!(record.is_terminal() && record.finalized);
    assert_eq!(record.effective_target_uuids, targets.to_vec());
    assert_eq!(record.created_effect_uuids.len(), 2);
}

#[tokio::test]
async fn failed_save_adopts_master_effect_and_overtime_save_grants_immunity() {
    let world =
        MemoryServices::new(catalog()).with_effects(RecordingEffects::new().with_master_effects());
    // goblin wis -1 against DC 14
    world.dice.push_d20([3]);
    let table =
        Table::with_world(RuntimeConfig::default(), world, ExtensionRegistry::default()).await;

    let id = table
        .gm
        .activate(ActivationRequest::new("Item.hold-person", "Actor.wizard").with_targets([goblin()]))
        .await
        .unwrap();
    let record = wait_for(&table.gm, &id, |record| record.finalized).await;

    assert_eq!(record.effective_target_uuids, vec![goblin()]);
    let master = record.master_effect_uuid.clone().expect("master effect adopted");
    assert!(record.created_effect_uuids.contains(&master));
    assert_eq!(record.created_effect_uuids.len(), 2);

    table.world.dice.push_d20([17]);
    let trigger = ConditionTrigger::new(
        "Item.hold-person",
        "Actor.wizard",
        "turnEnd",
        ApplicationType::Overtime,
    )
    .with_targets([goblin()])
    .from_effect(record.created_effect_uuids[0].clone(), Some(master.clone()));
    let follow_up = table.gm.trigger_condition(trigger).await.unwrap();
    let record = wait_for(&table.gm, &follow_up, |record| record.finalized).await;

    assert_eq!(record.application_type, ApplicationType::Overtime);
    assert_eq!(record.condition.as_deref(), Some("turnEnd"));
    assert_eq!(record.master_effect_uuid, Some(master));
    assert!(record.effective_target_uuids.is_empty());
    assert_eq!(table.world.effects.immunities(), vec![(
        goblin(),
        EntityRef::from("Item.hold-person")
    )]);
    assert_eq!(record.created_effect_uuids.len(), 1);
    assert!(record.transient_effect_uuids.is_empty());
    assert_eq!(table.world.effects.removed(), record.created_effect_uuids);
}

#[tokio::test]
async fn save_immunity_is_removed_on_completion_and_not_again_on_deletion() {
    let world =
        MemoryServices::new(catalog()).with_effects(RecordingEffects::new().with_master_effects());
    world.dice.push_d20([17]);
    let table =
        Table::with_world(RuntimeConfig::default(), world, ExtensionRegistry::default()).await;

    let trigger = ConditionTrigger::new(
        "Item.hold-person",
        "Actor.wizard",
        "turnEnd",
        ApplicationType::Overtime,
    )
    .with_targets([goblin()]);
    let id = table.gm.trigger_condition(trigger).await.unwrap();
    let record = wait_for(&table.gm, &id, |record| {
        record.finalized && record.transient_effect_uuids.is_empty()
    })
    .await;

    let [immunity] = record.created_effect_uuids.as_slice() else {
        panic!("expected one immunity effect, got {:?}", record.created_effect_uuids);
    };
    assert_eq!(table.world.effects.removed(), vec![immunity.clone()]);

    assert!(table.gm.delete(&id).await.unwrap());
    let store = table.store.clone();
    wait_until(|| {
        let store = store.clone();
        async move { store.is_empty() }
    })
    .await;
    assert_eq!(table.world.effects.removed(), vec![immunity.clone()]);
}

#[tokio::test]
async fn deleting_a_finished_activation_removes_leftover_transient_effects() {
    let table = Table::new(manual_config()).await;
    let id = table
        .gm
        .activate(ActivationRequest::new("Item.bless", "Actor.wizard").with_targets([goblin()]))
        .await
        .unwrap();
    table.gm.step_local(&id).await.unwrap();
    let record = table.gm.record(&id).await.unwrap().unwrap();
    assert!(record.finalized);

    // a transient effect whose removal never happened
    let stray = EntityRef::from("Effect.stray");
    let mut message = table.store.load(&id).await.unwrap().unwrap();
    let mut stale = message.record().unwrap();
    stale.apply(&Mutation::AddTransientEffects {
        effects: vec![stray.clone()],
    });
    message.set_record(&stale).unwrap();
    table
        .store
        .write(&ClientIdentity::gm("gm"), message)
        .await
        .unwrap();
    assert!(table.gm.delete(&id).await.unwrap());

    let effects = table.world.effects.clone();
    wait_until(|| {
        let effects = effects.clone();
        let stray = stray.clone();
        async move { effects.removed().contains(&stray) }
    })
    .await;
    assert_eq!(table.world.effects.removed(), vec![stray]);
}

#[tokio::test]
async fn players_cannot_trigger_conditions() {
    let table = Table::new(manual_config()).await;
    let (alice, _) = table.player("alice").await;
    let err = alice
        .trigger_condition(ConditionTrigger::new(
            "Item.hold-person",
            "Actor.wizard",
            "turnEnd",
            ApplicationType::Overtime,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::GmOnly { .. }));
}

#[tokio::test]
async fn player_save_is_forwarded_and_gm_finishes() {
    let table = Table::new(RuntimeConfig::default()).await;
    let (bob, bob_services) = table.player("bob").await;
    // wizard wis +4 against DC 14
    bob_services.dice.push_d20([2]);
    let wizard = EntityRef::from("Actor.wizard");

    let id = table
        .gm
        .activate(ActivationRequest::new("Item.hold-person", "Actor.goblin").with_targets([wizard.clone()]))
        .await
        .unwrap();
    wait_for(&bob, &id, |record| in_state(record, Step::WaitingForSaves)).await;

    let stranger = SaveEntry {
        actor: ogre(),
        roll: RollResult::new("1d20+1", 20),
    };
    let err = bob.submit_save(&id, stranger).await.unwrap_err();
    assert!(matches!(err, RuntimeError::NotATarget { ref actor, .. } if *actor == ogre()));

    let save = bob.roll_save(&id, &wizard).await.unwrap().expect("save owed");
    assert_eq!(save.roll.total, 6);
    assert!(bob.roll_save(&id, &wizard).await.unwrap().is_none());

    let record = wait_for(&table.gm, &id, |record| record.finalized).await;
    assert_eq!(record.saves.len(), 1);
    assert_eq!(record.effective_target_uuids, vec![wizard]);
}

#[tokio::test]
async fn confirmed_targets_replace_the_selection() {
    let config = RuntimeConfig::default().with_rules(rules(|rules| rules.confirm_targets = true));
    let table = Table::new(config).await;
    let (alice, alice_services) = table.player("alice").await;
    alice_services.prompts.select("alice", [goblin(), ogre()]);
    alice_services.dice.push_damage([9]);

    let id = alice
        .activate(ActivationRequest::new("Item.magic-missile", "Actor.wizard"))
        .await
        .unwrap();
    let waiting = wait_for(&alice, &id, |record| {
        in_state(record, Step::WaitingForTargetConfirmation)
    })
    .await;
    assert_eq!(waiting.target_uuids, vec![goblin(), ogre()]);

    let commit = alice.confirm_targets(&id, Some(vec![goblin()])).await.unwrap();
    assert!(commit.is_applied());

    let record = wait_for(&table.gm, &id, |record| record.finalized).await;
    assert_eq!(record.effective_target_uuids, vec![goblin()]);
    let applications = table.world.damage.applications();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].full, vec![goblin()]);
    assert_eq!(applications[0].total(), 9);
}

#[tokio::test]
async fn missing_selection_warns_the_originator() {
    let table = Table::new(RuntimeConfig::default()).await;
    let (alice, _) = table.player("alice").await;
    let mut notices = alice.subscribe(Topic::Notice);

    let id = alice
        .activate(ActivationRequest::new("Item.longsword", "Actor.fighter"))
        .await
        .unwrap();

    let event = tokio::time::timeout(common::WAIT, notices.recv())
        .await
        .expect("notice published")
        .unwrap();
    let Event::Notice(notice) = event else {
        panic!("expected a notice, got {event:?}");
    };
    assert_eq!(notice.key, NoticeKey::NoTargets);
    assert_eq!(notice.record, id);

    let record = alice.record(&id).await.unwrap().unwrap();
    assert!(in_state(&record, Step::ApplySelectedTargets));
}

#[tokio::test]
async fn cancelled_template_stalls_placement() {
    let table = Table::new(RuntimeConfig::default()).await;
    let mut notices = table.gm.subscribe(Topic::Notice);

    let id = table
        .gm
        .activate(ActivationRequest::new("Item.fireball", "Actor.wizard"))
        .await
        .unwrap();

    let event = tokio::time::timeout(common::WAIT, notices.recv())
        .await
        .expect("notice published")
        .unwrap();
    assert!(matches!(
        event,
        Event::Notice(ref notice) if notice.key == NoticeKey::TemplateCancelled
    ));
    let record = table.gm.record(&id).await.unwrap().unwrap();
    assert!(in_state(&record, Step::PlaceTemplate));
}

#[tokio::test]
async fn consumed_items_are_deleted_on_completion() {
    let config =
        RuntimeConfig::default().with_rules(rules(|rules| rules.delete_instantaneous = true));
    let table = Table::new(config).await;
    let mut lifecycle = table.gm.subscribe(Topic::Lifecycle);

    let id = table
        .gm
        .activate(
            ActivationRequest::new("Item.potion-of-healing", "Actor.fighter")
                .with_targets(["Actor.fighter"]),
        )
        .await
        .unwrap();

    let completed = async {
        loop {
            if let Ok(Event::Lifecycle(LifecycleEvent::Deleted { record })) = lifecycle.recv().await
                && record == id
            {
                break;
            }
        }
    };
    tokio::time::timeout(common::WAIT, completed)
        .await
        .expect("instantaneous message deleted");

    assert_eq!(
        table.world.entities.deleted_items(),
        vec![EntityRef::from("Item.potion-of-healing")]
    );
    assert!(table.store.load(&id).await.unwrap().is_none());
}

// ============================================================================
// Custom steps
// ============================================================================

/// Marks the targets and parks the record until a ritual finishes.
struct MarkWard {
    fail: bool,
}

#[async_trait]
impl StepExtension for MarkWard {
    fn name(&self) -> &str {
        "markWard"
    }

    async fn run(&self, ctx: &ExtensionContext<'_>) -> Result<ExtensionOutcome, ExtensionError> {
        if self.fail {
            return Err(ExtensionError::new(self.name(), "ward circle broken"));
        }
        assert!(ctx.client.is_gm);
        Ok(ExtensionOutcome::idle()
            .with_mutation(Mutation::AddCreatedEffects {
                effects: vec![EntityRef::from("Effect.ward")],
            })
            .then("awaitRitual"))
    }
}

async fn ward_table(fail: bool) -> Table {
    let mut catalog = catalog();
    catalog.actions.insert("Item.ward".into(), ActionProfile {
        name: "Ward".into(),
        custom_steps: vec!["markWard".into()],
        immediate: PhaseProfile {
            effects: vec![EffectSpec {
                name: "Warded".into(),
                duration_rounds: None,
            }],
            ..PhaseProfile::default()
        },
        ..ActionProfile::default()
    });
    let extensions = ExtensionRegistry::default().with_step(Arc::new(MarkWard { fail }));
    Table::with_world(
        RuntimeConfig::default(),
        MemoryServices::new(catalog),
        extensions,
    )
    .await
}

#[tokio::test]
async fn extension_step_runs_on_the_gm_and_deletion_abandons_its_effects() {
    let table = ward_table(false).await;

    let id = table
        .gm
        .activate(
            ActivationRequest::new("Item.ward", "Actor.fighter")
                .with_targets(["Actor.fighter"])
                .with_mirrors(MirrorMode::Both),
        )
        .await
        .unwrap();
    let record = wait_for(&table.gm, &id, |record| {
        record.state == Some(StateName::from("awaitRitual"))
    })
    .await;
    assert_eq!(record.created_effect_uuids, vec![EntityRef::from("Effect.ward")]);
    assert_eq!(table.store.len(), 3);

    assert!(table.gm.delete(&id).await.unwrap());

    let effects = table.world.effects.clone();
    let store = table.store.clone();
    wait_until(|| {
        let effects = effects.clone();
        let store = store.clone();
        async move {
            store.is_empty() && effects.removed().contains(&EntityRef::from("Effect.ward"))
        }
    })
    .await;
}

#[tokio::test]
async fn failing_extension_reports_and_stays_put() {
    let table = ward_table(true).await;
    let mut notices = table.gm.subscribe(Topic::Notice);

    let id = table
        .gm
        .activate(ActivationRequest::new("Item.ward", "Actor.fighter").with_targets(["Actor.fighter"]))
        .await
        .unwrap();

    let event = tokio::time::timeout(common::WAIT, notices.recv())
        .await
        .expect("notice published")
        .unwrap();
    assert!(matches!(
        event,
        Event::Notice(ref notice) if notice.key == NoticeKey::TechnicalError && notice.record == id
    ));

    let record = table.gm.record(&id).await.unwrap().unwrap();
    assert_eq!(record.state, Some(StateName::from("markWard")));
    assert!(record.created_effect_uuids.is_empty());
}

#[tokio::test]
async fn unregistered_custom_step_stalls_in_place() {
    let mut catalog = catalog();
    catalog.actions.insert("Item.odd-relic".into(), ActionProfile {
        name: "Odd Relic".into(),
        custom_steps: vec!["nobodyHandles".into()],
        immediate: PhaseProfile {
            effects: vec![EffectSpec {
                name: "Glowing".into(),
                duration_rounds: None,
            }],
            ..PhaseProfile::default()
        },
        ..ActionProfile::default()
    });
    let table = Table::with_world(
        manual_config(),
        MemoryServices::new(catalog),
        ExtensionRegistry::default(),
    )
    .await;

    let id = table
        .gm
        .activate(
            ActivationRequest::new("Item.odd-relic", "Actor.fighter")
                .with_targets(["Actor.fighter"]),
        )
        .await
        .unwrap();
    table.gm.step_local(&id).await.unwrap();

    let record = table.gm.record(&id).await.unwrap().unwrap();
    assert_eq!(record.state, Some(StateName::from("nobodyHandles")));
    assert_eq!(record.flow_steps, vec!["applyEffects".to_string()]);

    let revision = table.store.load(&id).await.unwrap().unwrap().revision;
    let again = table.gm.step_local(&id).await.unwrap();
    assert_eq!(again, Scheduled::Executed {
        transitions: 0,
        outcome: StepOutcome::Parked,
    });
    assert_eq!(table.store.load(&id).await.unwrap().unwrap().revision, revision);
    assert!(table.world.effects.requests().is_empty());
}
