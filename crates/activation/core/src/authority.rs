//! Authority partitioning.
//!
//! Every transition belongs to exactly one role. A client computes its own
//! roles from replicated message metadata (author, originator, mirror link)
//! that is fixed at creation, so all clients agree on who may run what
//! without any negotiation.
//!
//! | State | Role |
//! |---|---|
//! | `idle` | author |
//! | target selection, templates, attack/damage rolls | originator |
//! | attack results, saves, damage/effect application, cleanup | gm |
//! | custom extension states | declared by the extension |

use bitflags::bitflags;

use crate::ids::UserId;
use crate::message::Message;
use crate::step::{StateName, Step};

/// Identity of the local client.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientIdentity {
    pub user: UserId,
    pub is_gm: bool,
}

impl ClientIdentity {
    pub fn gm(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            is_gm: true,
        }
    }

    pub fn player(user: impl Into<UserId>) -> Self {
        Self {
            user: user.into(),
            is_gm: false,
        }
    }
}

/// A role a client can hold for one message.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Owns the backing message.
    Author,
    /// Started the action.
    Originator,
    /// The authoritative client for world mutations.
    Gm,
    /// Read-only viewer; never executes transitions.
    Observer,
}

bitflags! {
    /// Every role a client holds for one message at the same time.
    ///
    /// The GM commonly holds several (author of automation messages, GM,
    /// and originator when no player started the action). An empty set
    /// means observer.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Roles: u8 {
        const AUTHOR     = 1 << 0;
        const ORIGINATOR = 1 << 1;
        const GM         = 1 << 2;
    }
}

impl Roles {
    /// Returns true if these roles may execute a transition requiring `role`.
    pub fn permits(self, role: Role) -> bool {
        match role {
            Role::Author => self.contains(Roles::AUTHOR),
            Role::Originator => self.contains(Roles::ORIGINATOR),
            Role::Gm => self.contains(Roles::GM),
            Role::Observer => false,
        }
    }

    pub fn is_observer(self) -> bool {
        self.is_empty()
    }
}

/// Computes every role `client` holds for `message`.
pub fn roles_for(client: &ClientIdentity, message: &Message) -> Roles {
    if message.is_mirror() {
        return Roles::empty();
    }

    let mut roles = Roles::empty();
    if client.user == message.author {
        roles |= Roles::AUTHOR;
    }
    match &message.originator {
        Some(originator) if *originator == client.user => roles |= Roles::ORIGINATOR,
        None if client.is_gm => roles |= Roles::ORIGINATOR,
        _ => {}
    }
    if client.is_gm {
        roles |= Roles::GM;
    }
    roles
}

/// Returns the single most privileged role `client` holds for `message`.
pub fn role_for(client: &ClientIdentity, message: &Message) -> Role {
    let roles = roles_for(client, message);
    if roles.contains(Roles::GM) {
        Role::Gm
    } else if roles.contains(Roles::AUTHOR) {
        Role::Author
    } else if roles.contains(Roles::ORIGINATOR) {
        Role::Originator
    } else {
        Role::Observer
    }
}

/// Who may execute the transition out of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Requirement {
    Role(Role),
    /// Decided by the extension registered for a custom state.
    Extension,
}

/// The authority table. `None` is the terminal state, whose one-time cleanup
/// belongs to the GM.
pub fn required_role(state: Option<&StateName>) -> Requirement {
    let Some(state) = state else {
        return Requirement::Role(Role::Gm);
    };
    let Some(step) = state.step() else {
        return Requirement::Extension;
    };

    let role = match step {
        Step::Idle => Role::Author,

        Step::ApplySelectedTargets
        | Step::WaitingForTargetConfirmation
        | Step::PlaceTemplate
        | Step::PerformAttackRoll
        | Step::PerformAttackDamageRoll
        | Step::WaitingForAttackDamageRoll
        | Step::PerformDamageRoll => Role::Originator,

        Step::WaitingForAttackResult
        | Step::PerformSavingThrow
        | Step::WaitingForSaves
        | Step::SavesCompleted
        | Step::ApplyDamage
        | Step::ApplyEffects => Role::Gm,
    };
    Requirement::Role(role)
}
