//! Public API surface of the runtime.
//!
//! Re-exports the error types and the request types consumed by
//! [`crate::ActivationClient`].
mod errors;
mod requests;

pub use errors::{Result, RuntimeError, ServiceError, ServiceResult};
pub use requests::{ActivationRequest, ConditionTrigger, MirrorMode};
