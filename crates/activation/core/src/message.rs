//! The replicated message an activation lives on.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::ids::{MessageId, UserId};
use crate::record::ActivationRecord;

/// A replicated document carrying an activation payload.
///
/// The primary message is authoritative. Mirror messages are observer copies
/// (for the GM or for players) whose payload is overwritten after every
/// primary write; they only hold a back-reference to the primary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,

    /// User owning the document; the only non-GM user allowed to write it.
    pub author: UserId,

    /// Player who started the action. `None` when it was started on the GM's
    /// side without a player (automation, triggered conditions).
    #[serde(default)]
    pub originator: Option<UserId>,

    /// Set on mirror copies.
    #[serde(default)]
    pub mirror_of: Option<MessageId>,

    /// Mirror copies of a primary message.
    #[serde(default)]
    pub mirrors: Vec<MessageId>,

    /// Incremented by the store on every write.
    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl Message {
    /// Creates a primary message holding `record`.
    pub fn primary(
        id: MessageId,
        author: UserId,
        originator: Option<UserId>,
        record: &ActivationRecord,
    ) -> Result<Self, RecordError> {
        Ok(Self {
            id,
            author,
            originator,
            mirror_of: None,
            mirrors: Vec::new(),
            revision: 0,
            payload: Some(record.to_payload()?),
        })
    }

    /// Creates an observer copy of this message.
    pub fn mirror(&self, id: MessageId, author: UserId) -> Self {
        Self {
            id,
            author,
            originator: self.originator.clone(),
            mirror_of: Some(self.id.clone()),
            mirrors: Vec::new(),
            revision: 0,
            payload: self.payload.clone(),
        }
    }

    pub fn is_mirror(&self) -> bool {
        self.mirror_of.is_some()
    }

    /// Decodes the activation payload.
    pub fn record(&self) -> Result<ActivationRecord, RecordError> {
        let payload = self
            .payload
            .as_ref()
            .ok_or_else(|| RecordError::MissingPayload {
                message: self.id.to_string(),
            })?;
        ActivationRecord::from_payload(payload)
    }

    /// Replaces the activation payload.
    pub fn set_record(&mut self, record: &ActivationRecord) -> Result<(), RecordError> {
        self.payload = Some(record.to_payload()?);
        Ok(())
    }
}
