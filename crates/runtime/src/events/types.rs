//! Event payloads published on the runtime event bus.
use serde::{Deserialize, Serialize};

use activation_core::{EntityRef, MessageId, StateName, UserId};

/// Lifecycle of activation records as observed by the local client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Created {
        record: MessageId,
        item: EntityRef,
        author: UserId,
    },
    /// Written by this client; remote transitions arrive as store changes.
    StateChanged {
        record: MessageId,
        from: Option<StateName>,
        to: Option<StateName>,
    },
    /// Terminal cleanup ran.
    Completed { record: MessageId },
    Deleted { record: MessageId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Stable localization keys for user-facing notices.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum NoticeKey {
    #[strum(serialize = "ACTIVATION.Warning.NoTargets")]
    NoTargets,
    #[strum(serialize = "ACTIVATION.Warning.SingleTargetRequired")]
    SingleTargetRequired,
    #[strum(serialize = "ACTIVATION.Warning.TemplateCancelled")]
    TemplateCancelled,
    #[strum(serialize = "ACTIVATION.Warning.RollCancelled")]
    RollCancelled,
    #[strum(serialize = "ACTIVATION.Warning.ItemMissing")]
    ItemMissing,
    #[strum(serialize = "ACTIVATION.Warning.NoSaveDc")]
    NoSaveDc,
    #[strum(serialize = "ACTIVATION.Error.Technical")]
    TechnicalError,
}

impl NoticeKey {
    pub fn localization_key(&self) -> &str {
        self.as_ref()
    }

    pub fn level(&self) -> NoticeLevel {
        match self {
            NoticeKey::TechnicalError => NoticeLevel::Error,
            _ => NoticeLevel::Warning,
        }
    }
}

/// A message for the local user about one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub key: NoticeKey,
    pub record: MessageId,
    pub user: UserId,
}

impl Notice {
    pub fn new(key: NoticeKey, record: MessageId, user: UserId) -> Self {
        Self {
            level: key.level(),
            key,
            record,
            user,
        }
    }
}
