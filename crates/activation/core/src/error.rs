//! Common error infrastructure for activation-core.
//!
//! Errors raised while decoding or validating records are classified by
//! severity so the runtime can decide between surfacing a notice, logging a
//! diagnostic, or propagating the failure.

use thiserror::Error;

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// The step can be retried once the missing input arrives.
    Recoverable,

    /// The input is invalid and should not be retried unchanged.
    Validation,

    /// Unexpected inconsistency in replicated data.
    Internal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }
}

/// Common trait for all activation errors.
pub trait ActivationFault: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Errors raised while reading or writing the replicated record payload.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("message {message} carries no activation payload")]
    MissingPayload { message: String },

    #[error("failed to decode activation payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode activation payload: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ActivationFault for RecordError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            RecordError::MissingPayload { .. } => ErrorSeverity::Validation,
            RecordError::Decode(_) | RecordError::Encode(_) => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RecordError::MissingPayload { .. } => "record.missing_payload",
            RecordError::Decode(_) => "record.decode",
            RecordError::Encode(_) => "record.encode",
        }
    }
}
