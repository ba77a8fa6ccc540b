//! Lifecycle events and user notices published by a client.
//!
//! Front ends subscribe to [`Topic::Lifecycle`] to follow records and to
//! [`Topic::Notice`] to show localized warnings.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{LifecycleEvent, Notice, NoticeKey, NoticeLevel};
