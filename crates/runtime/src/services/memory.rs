//! In-memory service implementations for tests and local runs.
//!
//! Dice are scripted, damage and effect application are recorded instead of
//! touching actors, and prompts answer with fixed values.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use activation_content::{ActionCatalog, ActorCatalog, Catalog};
use activation_core::{
    ActionProfile, ActorSheet, ConfigMap, DamagePart, EntityRef, RollResult, UserId,
};
use async_trait::async_trait;

use super::Services;
use super::traits::{
    DamageService, EffectService, EntityResolver, PromptService, RollService, TemplateService,
};
use super::types::{
    AdvantageMode, AttackRollRequest, CreatedEffect, DamageApplication, DamageOutcome,
    DamageRollRequest, EffectRequest, RollKind, SaveRollRequest, TemplateData, TemplateRequest,
};
use crate::api::{ServiceError, ServiceResult};

fn poisoned(service: &'static str) -> ServiceError {
    ServiceError::new(service, "lock poisoned")
}

// ============================================================================
// Entities
// ============================================================================

/// Resolves items and actors from a content [`Catalog`].
pub struct CatalogResolver {
    actions: RwLock<ActionCatalog>,
    actors: ActorCatalog,
    deleted: Mutex<Vec<EntityRef>>,
}

impl CatalogResolver {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            actions: RwLock::new(catalog.actions),
            actors: catalog.actors,
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Items removed through [`EntityResolver::delete_item`].
    pub fn deleted_items(&self) -> Vec<EntityRef> {
        self.deleted
            .lock()
            .map(|deleted| deleted.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EntityResolver for CatalogResolver {
    async fn action(&self, item: &EntityRef) -> Option<ActionProfile> {
        self.actions.read().ok()?.get(item).cloned()
    }

    async fn actor(&self, actor: &EntityRef) -> Option<ActorSheet> {
        self.actors.get(actor).cloned()
    }

    async fn delete_item(&self, item: &EntityRef) -> ServiceResult<()> {
        let removed = self
            .actions
            .write()
            .map_err(|_| poisoned("entities"))?
            .remove(item);
        if removed.is_some() {
            self.deleted
                .lock()
                .map_err(|_| poisoned("entities"))?
                .push(item.clone());
        }
        Ok(())
    }
}

// ============================================================================
// Dice
// ============================================================================

/// Dice that return queued values.
///
/// d20 rolls pop from one queue and damage totals from another; an empty
/// queue falls back to a fixed value so unscripted rolls stay deterministic.
pub struct ScriptedDice {
    d20: Mutex<VecDeque<i32>>,
    damage: Mutex<VecDeque<i32>>,
    fallback_d20: i32,
    fallback_damage: i32,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self {
            d20: Mutex::new(VecDeque::new()),
            damage: Mutex::new(VecDeque::new()),
            fallback_d20: 10,
            fallback_damage: 1,
        }
    }

    pub fn with_d20(self, rolls: impl IntoIterator<Item = i32>) -> Self {
        self.push_d20(rolls);
        self
    }

    pub fn with_damage(self, totals: impl IntoIterator<Item = i32>) -> Self {
        self.push_damage(totals);
        self
    }

    pub fn push_d20(&self, rolls: impl IntoIterator<Item = i32>) {
        if let Ok(mut queue) = self.d20.lock() {
            queue.extend(rolls);
        }
    }

    pub fn push_damage(&self, totals: impl IntoIterator<Item = i32>) {
        if let Ok(mut queue) = self.damage.lock() {
            queue.extend(totals);
        }
    }

    fn next_d20(&self) -> ServiceResult<i32> {
        let mut queue = self.d20.lock().map_err(|_| poisoned("dice"))?;
        Ok(queue.pop_front().unwrap_or(self.fallback_d20))
    }

    fn next_damage(&self) -> ServiceResult<i32> {
        let mut queue = self.damage.lock().map_err(|_| poisoned("dice"))?;
        Ok(queue.pop_front().unwrap_or(self.fallback_damage))
    }

    fn d20(&self, mode: AdvantageMode) -> ServiceResult<i32> {
        let first = self.next_d20()?;
        Ok(match mode {
            AdvantageMode::Normal => first,
            AdvantageMode::Advantage => first.max(self.next_d20()?),
            AdvantageMode::Disadvantage => first.min(self.next_d20()?),
        })
    }
}

impl Default for ScriptedDice {
    fn default() -> Self {
        Self::new()
    }
}

fn with_bonus(bonus: i32) -> String {
    if bonus < 0 {
        format!("1d20{bonus}")
    } else {
        format!("1d20+{bonus}")
    }
}

#[async_trait]
impl RollService for ScriptedDice {
    async fn roll_attack(&self, request: &AttackRollRequest) -> ServiceResult<RollResult> {
        let natural = self.d20(request.mode)?;
        let total = natural.saturating_add(request.bonus);
        Ok(RollResult::new(with_bonus(request.bonus), total).with_natural(natural))
    }

    async fn roll_damage(&self, request: &DamageRollRequest) -> ServiceResult<Vec<DamagePart>> {
        request
            .parts
            .iter()
            .map(|spec| {
                let rolled = self.next_damage()?;
                Ok(DamagePart {
                    formula: spec.formula.clone(),
                    total: if request.critical { rolled * 2 } else { rolled },
                    damage_type: spec.damage_type.clone(),
                })
            })
            .collect()
    }

    async fn roll_save(&self, request: &SaveRollRequest) -> ServiceResult<RollResult> {
        let natural = self.next_d20()?;
        let total = natural.saturating_add(request.bonus);
        Ok(RollResult::new(with_bonus(request.bonus), total).with_natural(natural))
    }
}

// ============================================================================
// Damage & effects
// ============================================================================

/// Records every damage application.
#[derive(Default)]
pub struct RecordingDamage {
    calls: Mutex<Vec<(EntityRef, DamageApplication)>>,
}

impl RecordingDamage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applications(&self) -> Vec<DamageApplication> {
        self.calls
            .lock()
            .map(|calls| calls.iter().map(|(_, app)| app.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DamageService for RecordingDamage {
    async fn apply_damage(
        &self,
        source: &EntityRef,
        application: &DamageApplication,
    ) -> ServiceResult<DamageOutcome> {
        self.calls
            .lock()
            .map_err(|_| poisoned("damage"))?
            .push((source.clone(), application.clone()));

        let total = application.total();
        let applied = application
            .full
            .iter()
            .map(|target| (target.clone(), total))
            .chain(application.half.iter().map(|target| (target.clone(), total / 2)))
            .collect();
        Ok(DamageOutcome { applied })
    }
}

/// Creates numbered effects and records every call.
#[derive(Default)]
pub struct RecordingEffects {
    next: AtomicU64,
    master_effects: AtomicBool,
    requests: Mutex<Vec<EffectRequest>>,
    immunities: Mutex<Vec<(EntityRef, EntityRef)>>,
    removed: Mutex<Vec<EntityRef>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also create a master effect for immediate applications with effects.
    pub fn with_master_effects(self) -> Self {
        self.master_effects.store(true, Ordering::Relaxed);
        self
    }

    pub fn requests(&self) -> Vec<EffectRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn immunities(&self) -> Vec<(EntityRef, EntityRef)> {
        self.immunities
            .lock()
            .map(|immunities| immunities.clone())
            .unwrap_or_default()
    }

    pub fn removed(&self) -> Vec<EntityRef> {
        self.removed
            .lock()
            .map(|removed| removed.clone())
            .unwrap_or_default()
    }

    fn mint(&self) -> EntityRef {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        EntityRef::new(format!("Effect.{sequence}"))
    }
}

#[async_trait]
impl EffectService for RecordingEffects {
    async fn apply_effects(&self, request: &EffectRequest) -> ServiceResult<Vec<CreatedEffect>> {
        self.requests
            .lock()
            .map_err(|_| poisoned("effects"))?
            .push(request.clone());

        let mut created = Vec::new();
        for target in &request.effective_targets {
            for _ in &request.effects {
                created.push(CreatedEffect {
                    uuid: self.mint(),
                    target: Some(target.clone()),
                    master: false,
                });
            }
        }
        if self.master_effects.load(Ordering::Relaxed)
            && !request.application.is_triggered()
            && !created.is_empty()
        {
            created.push(CreatedEffect {
                uuid: self.mint(),
                target: None,
                master: true,
            });
        }
        Ok(created)
    }

    async fn grant_save_immunity(
        &self,
        target: &EntityRef,
        item: &EntityRef,
    ) -> ServiceResult<CreatedEffect> {
        self.immunities
            .lock()
            .map_err(|_| poisoned("effects"))?
            .push((target.clone(), item.clone()));
        Ok(CreatedEffect {
            uuid: self.mint(),
            target: Some(target.clone()),
            master: false,
        })
    }

    async fn remove_effects(&self, effects: &[EntityRef]) -> ServiceResult<()> {
        self.removed
            .lock()
            .map_err(|_| poisoned("effects"))?
            .extend(effects.iter().cloned());
        Ok(())
    }
}

// ============================================================================
// Templates & prompts
// ============================================================================

/// Places templates covering a fixed set of tokens, or cancels.
pub struct FixedTemplates {
    covered: RwLock<Option<Vec<EntityRef>>>,
    next: AtomicU64,
}

impl FixedTemplates {
    /// Every placement covers `targets`.
    pub fn covering<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityRef>,
    {
        Self {
            covered: RwLock::new(Some(targets.into_iter().map(Into::into).collect())),
            next: AtomicU64::new(0),
        }
    }

    /// Every placement is cancelled.
    pub fn cancelled() -> Self {
        Self {
            covered: RwLock::new(None),
            next: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl TemplateService for FixedTemplates {
    async fn create_template(
        &self,
        _request: &TemplateRequest,
    ) -> ServiceResult<Option<TemplateData>> {
        let covered = self.covered.read().map_err(|_| poisoned("templates"))?;
        Ok(covered.as_ref().map(|targets| {
            let sequence = self.next.fetch_add(1, Ordering::Relaxed) + 1;
            TemplateData {
                uuid: EntityRef::new(format!("Template.{sequence}")),
                targets: targets.clone(),
            }
        }))
    }
}

/// Prompts answered from preset selections and options.
#[derive(Default)]
pub struct FixedPrompts {
    selections: RwLock<HashMap<UserId, Vec<EntityRef>>>,
    options: RwLock<ConfigMap>,
    dismiss: AtomicBool,
}

impl FixedPrompts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tokens `user` has targeted.
    pub fn select<I, T>(&self, user: impl Into<UserId>, targets: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityRef>,
    {
        if let Ok(mut selections) = self.selections.write() {
            selections.insert(user.into(), targets.into_iter().map(Into::into).collect());
        }
    }

    pub fn set_roll_options(&self, options: ConfigMap) {
        if let Ok(mut slot) = self.options.write() {
            *slot = options;
        }
    }

    /// Makes every roll dialog come back dismissed.
    pub fn dismiss_rolls(&self, dismiss: bool) {
        self.dismiss.store(dismiss, Ordering::Relaxed);
    }
}

#[async_trait]
impl PromptService for FixedPrompts {
    async fn selected_targets(&self, user: &UserId) -> Vec<EntityRef> {
        self.selections
            .read()
            .ok()
            .and_then(|selections| selections.get(user).cloned())
            .unwrap_or_default()
    }

    async fn roll_options(&self, _user: &UserId, _kind: RollKind) -> Option<ConfigMap> {
        if self.dismiss.load(Ordering::Relaxed) {
            return None;
        }
        self.options.read().ok().map(|options| options.clone())
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Concrete in-memory collaborators, kept typed so tests can inspect them.
#[derive(Clone)]
pub struct MemoryServices {
    pub entities: Arc<CatalogResolver>,
    pub dice: Arc<ScriptedDice>,
    pub damage: Arc<RecordingDamage>,
    pub effects: Arc<RecordingEffects>,
    pub templates: Arc<FixedTemplates>,
    pub prompts: Arc<FixedPrompts>,
}

impl MemoryServices {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            entities: Arc::new(CatalogResolver::new(catalog)),
            dice: Arc::new(ScriptedDice::new()),
            damage: Arc::new(RecordingDamage::new()),
            effects: Arc::new(RecordingEffects::new()),
            templates: Arc::new(FixedTemplates::cancelled()),
            prompts: Arc::new(FixedPrompts::new()),
        }
    }

    pub fn with_templates(mut self, templates: FixedTemplates) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    pub fn with_effects(mut self, effects: RecordingEffects) -> Self {
        self.effects = Arc::new(effects);
        self
    }

    /// Same world, but prompts and dice belonging to another user's client.
    pub fn for_other_client(&self) -> Self {
        Self {
            dice: Arc::new(ScriptedDice::new()),
            prompts: Arc::new(FixedPrompts::new()),
            ..self.clone()
        }
    }

    pub fn services(&self) -> Services {
        Services {
            entities: self.entities.clone(),
            rolls: self.dice.clone(),
            damage: self.damage.clone(),
            effects: self.effects.clone(),
            templates: self.templates.clone(),
            prompts: self.prompts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activation_core::DamagePartSpec;

    #[tokio::test]
    async fn scripted_attack_adds_bonus_and_keeps_natural() {
        let dice = ScriptedDice::new().with_d20([4, 17]);
        let request = AttackRollRequest {
            actor: "Actor.fighter".into(),
            item: "Item.longsword".into(),
            target: "Actor.goblin".into(),
            bonus: 5,
            mode: AdvantageMode::Advantage,
        };

        let roll = dice.roll_attack(&request).await.unwrap();
        assert_eq!(roll.natural, Some(17));
        assert_eq!(roll.total, 22);
        assert_eq!(roll.formula, "1d20+5");
    }

    #[tokio::test]
    async fn oversized_attack_bonus_saturates_the_total() {
        let dice = ScriptedDice::new().with_d20([20]);
        let request = AttackRollRequest {
            actor: "Actor.fighter".into(),
            item: "Item.longsword".into(),
            target: "Actor.goblin".into(),
            bonus: i32::MAX,
            mode: AdvantageMode::Normal,
        };

        let roll = dice.roll_attack(&request).await.unwrap();
        assert_eq!(roll.natural, Some(20));
        assert_eq!(roll.total, i32::MAX);
    }

    #[tokio::test]
    async fn critical_damage_doubles_scripted_totals() {
        let dice = ScriptedDice::new().with_damage([6]);
        let parts = dice
            .roll_damage(&DamageRollRequest {
                actor: "a".into(),
                item: "i".into(),
                parts: vec![DamagePartSpec {
                    formula: "1d8+3".into(),
                    damage_type: "slashing".into(),
                }],
                critical: true,
            })
            .await
            .unwrap();
        assert_eq!(parts[0].total, 12);
    }

    #[tokio::test]
    async fn recording_damage_halves_for_savers() {
        let damage = RecordingDamage::new();
        let outcome = damage
            .apply_damage(&"Actor.wizard".into(), &DamageApplication {
                item: "Item.fireball".into(),
                parts: vec![DamagePart {
                    formula: "8d6".into(),
                    total: 28,
                    damage_type: "fire".into(),
                }],
                full: vec!["Actor.ogre".into()],
                half: vec!["Actor.goblin".into()],
            })
            .await
            .unwrap();

        assert_eq!(outcome.applied, vec![
            (EntityRef::from("Actor.ogre"), 28),
            (EntityRef::from("Actor.goblin"), 14),
        ]);
        assert_eq!(damage.applications().len(), 1);
    }

    #[tokio::test]
    async fn catalog_resolver_deletes_items_once() {
        let resolver = CatalogResolver::new(Catalog::embedded().unwrap());
        let potion = EntityRef::from("Item.potion-of-healing");

        assert!(resolver.action(&potion).await.is_some());
        resolver.delete_item(&potion).await.unwrap();
        resolver.delete_item(&potion).await.unwrap();

        assert!(resolver.action(&potion).await.is_none());
        assert_eq!(resolver.deleted_items(), vec![potion]);
    }

    #[tokio::test]
    async fn prompts_answer_per_user() {
        let prompts = FixedPrompts::new();
        prompts.select("alice", ["Actor.goblin"]);

        assert_eq!(prompts.selected_targets(&"alice".into()).await, vec![
            EntityRef::from("Actor.goblin")
        ]);
        assert!(prompts.selected_targets(&"bob".into()).await.is_empty());

        prompts.dismiss_rolls(true);
        assert!(
            prompts
                .roll_options(&"alice".into(), RollKind::Attack)
                .await
                .is_none()
        );
    }
}
