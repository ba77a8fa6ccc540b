//! Calls a non-authoritative client sends to the GM.

use serde::{Deserialize, Serialize};

use activation_core::{MessageId, Mutation, UserId};

use crate::bridge::Precondition;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RemoteCall {
    /// Apply mutations to a record the caller may not write.
    Mutate {
        record: MessageId,
        precondition: Precondition,
        mutations: Vec<Mutation>,
        requested_by: UserId,
    },
    /// Ask the GM to run its local scheduler for a record.
    RequestStep {
        record: MessageId,
        requested_by: UserId,
    },
    Delete {
        record: MessageId,
        requested_by: UserId,
    },
}

impl RemoteCall {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCall::Mutate { .. } => "mutate",
            RemoteCall::RequestStep { .. } => "request_step",
            RemoteCall::Delete { .. } => "delete",
        }
    }

    pub fn record(&self) -> &MessageId {
        match self {
            RemoteCall::Mutate { record, .. }
            | RemoteCall::RequestStep { record, .. }
            | RemoteCall::Delete { record, .. } => record,
        }
    }

    pub fn requested_by(&self) -> &UserId {
        match self {
            RemoteCall::Mutate { requested_by, .. }
            | RemoteCall::RequestStep { requested_by, .. }
            | RemoteCall::Delete { requested_by, .. } => requested_by,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "camelCase")]
pub enum RemoteReply {
    /// Mutations were written at this revision.
    Committed { revision: u64 },
    /// Mutations were valid but changed nothing.
    Unchanged,
    /// The precondition no longer held.
    Stale,
    Missing,
    Stepped,
    Deleted,
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_are_tagged() {
        let call = RemoteCall::RequestStep {
            record: "Message.1".into(),
            requested_by: "alice".into(),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["call"], "requestStep");
        assert_eq!(json["requestedBy"], "alice");
        assert_eq!(call.name(), "request_step");
    }
}
