//! Document store for replicated activation messages.
//!
//! The store is the only state shared between clients. Every write produces a
//! change notification that the sync worker on each client turns into a step
//! request, which is how work hops from one authority to the next.

mod error;
mod memory;
mod traits;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use traits::{DocumentStore, StoreEvent, may_write};
