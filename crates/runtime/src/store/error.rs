//! Error types raised by document store implementations.

use activation_core::{MessageId, UserId};
use thiserror::Error;

/// Errors surfaced by document store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store lock was poisoned")]
    LockPoisoned,

    #[error("message {id} not found")]
    NotFound { id: MessageId },

    #[error("revision conflict on {id}: wrote against {expected}, store has {actual}")]
    Conflict {
        id: MessageId,
        expected: u64,
        actual: u64,
    },

    #[error("{user} may not write message {id}")]
    PermissionDenied { id: MessageId, user: UserId },
}

pub type Result<T> = std::result::Result<T, StoreError>;
