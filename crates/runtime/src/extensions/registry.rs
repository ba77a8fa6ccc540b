//! Registry of custom step handlers and attack roll hooks.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{AttackRollContext, AttackRollHook, StepExtension};

/// Looks up custom step handlers by state name and folds attack roll hooks.
///
/// Every client must register the same extensions: the flow compiled on one
/// client is executed step by step on others.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    steps: HashMap<String, Arc<dyn StepExtension>>,
    attack_hooks: Arc<[Arc<dyn AttackRollHook>]>,
}

impl ExtensionRegistry {
    /// Creates a registry; attack hooks are sorted by priority (lower first).
    pub fn new(
        steps: Vec<Arc<dyn StepExtension>>,
        mut attack_hooks: Vec<Arc<dyn AttackRollHook>>,
    ) -> Self {
        attack_hooks.sort_by_key(|hook| hook.priority());

        let steps = steps
            .into_iter()
            .map(|step| (step.name().to_owned(), step))
            .collect();

        Self {
            steps,
            attack_hooks: attack_hooks.into(),
        }
    }

    pub fn with_step(mut self, step: Arc<dyn StepExtension>) -> Self {
        self.steps.insert(step.name().to_owned(), step);
        self
    }

    pub fn with_attack_hook(self, hook: Arc<dyn AttackRollHook>) -> Self {
        let mut hooks: Vec<_> = self.attack_hooks.iter().cloned().collect();
        hooks.push(hook);
        let steps = self.steps.into_values().collect();
        Self::new(steps, hooks)
    }

    /// Finds the handler for a custom state.
    pub fn find(&self, name: &str) -> Option<&Arc<dyn StepExtension>> {
        self.steps.get(name)
    }

    /// Sum of every hook's bonus for this roll.
    pub fn attack_bonus(&self, ctx: &AttackRollContext<'_>) -> i32 {
        self.attack_hooks
            .iter()
            .map(|hook| {
                let bonus = hook.bonus(ctx);
                if bonus != 0 {
                    debug!(
                        target: "activation::resolver",
                        hook = hook.name(),
                        bonus,
                        "attack roll hook applied"
                    );
                }
                bonus
            })
            .fold(0, i32::saturating_add)
    }

    /// Returns the number of step handlers.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns an iterator over attack hook names and priorities (for debugging).
    pub fn attack_hooks(&self) -> impl Iterator<Item = (&'static str, i32)> + '_ {
        self.attack_hooks.iter().map(|h| (h.name(), h.priority()))
    }
}
