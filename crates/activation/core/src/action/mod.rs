//! Static description of what an action does.
//!
//! An [`ActionProfile`] is resolved from the source item when an activation
//! is created. It is read-only for the lifetime of the activation; the flow
//! compiler and the resolver only ever inspect it.

mod phase;
mod profile;

pub use phase::{ApplicationType, DamagePartSpec, EffectSpec, PhaseProfile, SaveSpec};
pub use profile::{ActionProfile, AttackSpec};
