//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from the document store, the GM-bound RPC channel, external
//! services and extensions so clients can bubble them up with consistent
//! context. Unmet preconditions are not errors: they surface as notices on
//! the event bus and leave the record where it is.
use std::time::Duration;

use activation_core::{ActivationFault, EntityRef, ErrorSeverity, MessageId, RecordError};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::extensions::ExtensionError;
use crate::rpc::RemoteReply;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Extension(#[from] ExtensionError),

    #[error("activation record {id} not found")]
    RecordNotFound { id: MessageId },

    #[error("{actor} is not a target of {id}")]
    NotATarget { id: MessageId, actor: EntityRef },

    #[error("item {item} does not resolve to an action")]
    UnknownItem { item: EntityRef },

    #[error("{operation} is only available on the GM client")]
    GmOnly { operation: &'static str },

    #[error("no remote channel configured for forwarding to the GM")]
    RemoteUnavailable,

    #[error("rpc channel closed")]
    RpcChannelClosed,

    #[error("rpc reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("remote call failed: {reason}")]
    Remote { reason: String },

    #[error("unexpected reply to {call}: {reply:?}")]
    UnexpectedReply {
        call: &'static str,
        reply: RemoteReply,
    },

    #[error("revision {revision} of {id} did not replicate within {timeout:?}")]
    PropagationTimeout {
        id: MessageId,
        revision: u64,
        timeout: Duration,
    },

    #[error("gave up writing {id} after {attempts} conflicting attempts")]
    WriteContention { id: MessageId, attempts: usize },

    #[error("store change feed closed")]
    ChangeFeedClosed,

    #[error("scheduler state lock poisoned")]
    LockPoisoned,

    #[error("client builder is missing {component}")]
    MissingComponent { component: &'static str },

    #[error("worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),
}

impl ActivationFault for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            RuntimeError::Record(err) => err.severity(),
            RuntimeError::Store(StoreError::Conflict { .. })
            | RuntimeError::PropagationTimeout { .. }
            | RuntimeError::WriteContention { .. }
            | RuntimeError::Service(_)
            | RuntimeError::Remote { .. } => ErrorSeverity::Recoverable,
            RuntimeError::UnknownItem { .. }
            | RuntimeError::NotATarget { .. }
            | RuntimeError::GmOnly { .. }
            | RuntimeError::RecordNotFound { .. }
            | RuntimeError::MissingComponent { .. }
            | RuntimeError::Store(StoreError::PermissionDenied { .. }) => ErrorSeverity::Validation,
            _ => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RuntimeError::Store(_) => "runtime.store",
            RuntimeError::Record(err) => err.error_code(),
            RuntimeError::Service(_) => "runtime.service",
            RuntimeError::Extension(_) => "runtime.extension",
            RuntimeError::RecordNotFound { .. } => "runtime.record_not_found",
            RuntimeError::UnknownItem { .. } => "runtime.unknown_item",
            RuntimeError::NotATarget { .. } => "runtime.not_a_target",
            RuntimeError::GmOnly { .. } => "runtime.gm_only",
            RuntimeError::RemoteUnavailable => "runtime.remote_unavailable",
            RuntimeError::RpcChannelClosed | RuntimeError::ReplyChannelClosed(_) => {
                "runtime.rpc_closed"
            }
            RuntimeError::Remote { .. } => "runtime.remote",
            RuntimeError::UnexpectedReply { .. } => "runtime.unexpected_reply",
            RuntimeError::PropagationTimeout { .. } => "runtime.propagation_timeout",
            RuntimeError::WriteContention { .. } => "runtime.write_contention",
            RuntimeError::ChangeFeedClosed => "runtime.change_feed_closed",
            RuntimeError::LockPoisoned => "runtime.lock_poisoned",
            RuntimeError::MissingComponent { .. } => "runtime.missing_component",
            RuntimeError::WorkerJoin(_) => "runtime.worker_join",
        }
    }
}

/// Failure reported by an external collaborator (dice, damage, effects, ...).
#[derive(Debug, Clone, Error)]
#[error("{service} service failed: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
