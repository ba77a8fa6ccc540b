//! Inputs accepted by [`crate::ActivationClient`] to start activations.
use activation_core::{ApplicationType, ConfigMap, EntityRef, UserId};

/// Which observer copies to create next to the primary message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MirrorMode {
    #[default]
    None,
    /// A copy whispered to the GM.
    Gm,
    /// A public copy for the other players.
    Players,
    Both,
}

impl MirrorMode {
    pub fn includes_gm(self) -> bool {
        matches!(self, MirrorMode::Gm | MirrorMode::Both)
    }

    pub fn includes_players(self) -> bool {
        matches!(self, MirrorMode::Players | MirrorMode::Both)
    }
}

/// A user starting an action.
#[derive(Clone, Debug)]
pub struct ActivationRequest {
    pub item: EntityRef,
    pub actor: EntityRef,
    pub config: ConfigMap,

    /// Preset targets; when empty the originator's selection is read later.
    pub targets: Vec<EntityRef>,

    /// Player the GM starts the action for. Ignored on player clients.
    pub on_behalf_of: Option<UserId>,

    pub mirrors: MirrorMode,
}

impl ActivationRequest {
    pub fn new(item: impl Into<EntityRef>, actor: impl Into<EntityRef>) -> Self {
        Self {
            item: item.into(),
            actor: actor.into(),
            config: ConfigMap::new(),
            targets: Vec::new(),
            on_behalf_of: None,
            mirrors: MirrorMode::None,
        }
    }

    pub fn with_targets<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityRef>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_config(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.to_owned(), value.into());
        self
    }

    pub fn on_behalf_of(mut self, user: impl Into<UserId>) -> Self {
        self.on_behalf_of = Some(user.into());
        self
    }

    pub fn with_mirrors(mut self, mirrors: MirrorMode) -> Self {
        self.mirrors = mirrors;
        self
    }
}

/// A persistent effect firing a follow-up phase of its action.
///
/// Triggered activations are started on the GM's side, skip attack rolls
/// and template placement, and reuse the trigger's targets.
#[derive(Clone, Debug)]
pub struct ConditionTrigger {
    pub item: EntityRef,
    pub actor: EntityRef,
    pub condition: String,
    pub application: ApplicationType,
    pub targets: Vec<EntityRef>,
    pub source_effect: Option<EntityRef>,
    pub master_effect: Option<EntityRef>,
    pub config: ConfigMap,
}

impl ConditionTrigger {
    pub fn new(
        item: impl Into<EntityRef>,
        actor: impl Into<EntityRef>,
        condition: impl Into<String>,
        application: ApplicationType,
    ) -> Self {
        Self {
            item: item.into(),
            actor: actor.into(),
            condition: condition.into(),
            application,
            targets: Vec::new(),
            source_effect: None,
            master_effect: None,
            config: ConfigMap::new(),
        }
    }

    pub fn with_targets<I, T>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EntityRef>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_effect(mut self, source: impl Into<EntityRef>, master: Option<EntityRef>) -> Self {
        self.source_effect = Some(source.into());
        self.master_effect = master;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_modes() {
        assert!(MirrorMode::Both.includes_gm() && MirrorMode::Both.includes_players());
        assert!(!MirrorMode::None.includes_gm());
        assert!(!MirrorMode::Gm.includes_players());
    }

    #[test]
    fn request_builder_collects_targets_and_config() {
        let request = ActivationRequest::new("Item.longsword", "Actor.fighter")
            .with_targets(["Actor.goblin"])
            .with_config("advantage", true);
        assert_eq!(request.targets, vec![EntityRef::from("Actor.goblin")]);
        assert_eq!(request.config["advantage"], serde_json::Value::Bool(true));
    }
}
