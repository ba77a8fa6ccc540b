/// Table rules that change how individual transitions behave.
///
/// These are world settings shared by every client; each client reads the
/// same values so that all of them agree on which transitions exist.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesConfig {
    /// Compare attack rolls against the target's armor class automatically
    /// instead of waiting for the GM to record hit or miss.
    pub auto_resolve_attacks: bool,

    /// Roll saving throws for GM-controlled actors without prompting.
    pub auto_roll_npc_saves: bool,

    /// Park in `waiting-for-target-confirmation` after targets are picked.
    pub confirm_targets: bool,

    /// Wait for damage totals to be entered by hand after a hit.
    pub manual_damage_rolls: bool,

    /// Delete the backing message once an instantaneous action completes.
    pub delete_instantaneous: bool,
}

impl RulesConfig {
    pub const fn new() -> Self {
        Self {
            auto_resolve_attacks: false,
            auto_roll_npc_saves: true,
            confirm_targets: false,
            manual_damage_rolls: false,
            delete_instantaneous: false,
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::new()
    }
}
