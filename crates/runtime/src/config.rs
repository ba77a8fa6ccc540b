//! Runtime configuration and environment loading.
use std::env;
use std::time::Duration;

use activation_core::RulesConfig;

/// Configuration shared by the client façade, its bridge and its workers.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Capacity of each event bus topic.
    pub event_buffer_size: usize,

    /// Capacity of the GM-bound RPC queue.
    pub rpc_buffer_size: usize,

    /// Upper bound on self-chained transitions inside one scheduled step.
    pub max_chain_steps: usize,

    /// How long a forwarded mutation waits for its revision to replicate back.
    pub propagation_timeout: Duration,

    /// Optimistic write retries before giving up on a contended record.
    pub max_write_retries: usize,

    /// Step records automatically when the store reports a change.
    pub auto_step: bool,

    pub rules: RulesConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 100,
            rpc_buffer_size: 32,
            max_chain_steps: 64,
            propagation_timeout: Duration::from_millis(5_000),
            max_write_retries: 8,
            auto_step: true,
            rules: RulesConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ACTIVATION_EVENT_BUFFER` - Event bus capacity per topic (default: 100)
    /// - `ACTIVATION_RPC_BUFFER` - RPC queue size (default: 32)
    /// - `ACTIVATION_MAX_CHAIN_STEPS` - Chained transitions per step (default: 64)
    /// - `ACTIVATION_PROPAGATION_TIMEOUT_MS` - Replication wait (default: 5000)
    /// - `ACTIVATION_AUTO_RESOLVE_ATTACKS` - Compare attacks against AC (default: false)
    /// - `ACTIVATION_AUTO_ROLL_NPC_SAVES` - Roll GM-controlled saves (default: true)
    /// - `ACTIVATION_CONFIRM_TARGETS` - Wait for target confirmation (default: false)
    /// - `ACTIVATION_MANUAL_DAMAGE` - Enter damage by hand (default: false)
    /// - `ACTIVATION_DELETE_INSTANTANEOUS` - Delete finished instantaneous messages (default: false)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(capacity) = read_env::<usize>("ACTIVATION_EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("ACTIVATION_RPC_BUFFER") {
            config.rpc_buffer_size = capacity.max(1);
        }
        if let Some(limit) = read_env::<usize>("ACTIVATION_MAX_CHAIN_STEPS") {
            config.max_chain_steps = limit.max(1);
        }
        if let Some(millis) = read_env::<u64>("ACTIVATION_PROPAGATION_TIMEOUT_MS") {
            config.propagation_timeout = Duration::from_millis(millis);
        }

        let rules = &mut config.rules;
        read_flag("ACTIVATION_AUTO_RESOLVE_ATTACKS", &mut rules.auto_resolve_attacks);
        read_flag("ACTIVATION_AUTO_ROLL_NPC_SAVES", &mut rules.auto_roll_npc_saves);
        read_flag("ACTIVATION_CONFIRM_TARGETS", &mut rules.confirm_targets);
        read_flag("ACTIVATION_MANUAL_DAMAGE", &mut rules.manual_damage_rolls);
        read_flag("ACTIVATION_DELETE_INSTANTANEOUS", &mut rules.delete_instantaneous);

        config
    }

    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_auto_step(mut self, enabled: bool) -> Self {
        self.auto_step = enabled;
        self
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

/// Reads a boolean flag; a set variable with an unparseable value counts as true.
fn read_flag(key: &str, slot: &mut bool) {
    if let Some(enabled) = read_env::<bool>(key) {
        *slot = enabled;
    } else if env::var(key).is_ok() {
        *slot = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rules_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.rules, RulesConfig::new());
        assert_eq!(config.max_chain_steps, 64);
        assert!(config.auto_step);
    }

    #[test]
    fn builder_helpers_override_fields() {
        let rules = RulesConfig {
            confirm_targets: true,
            ..RulesConfig::new()
        };
        let config = RuntimeConfig::default()
            .with_rules(rules.clone())
            .with_auto_step(false);
        assert_eq!(config.rules, rules);
        assert!(!config.auto_step);
    }
}
