//! Non-owning identifiers.
//!
//! Records, messages, mirrors, actors, items and effects never hold live
//! references to each other; they link through these string identifiers and
//! resolve them through external services when needed.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Reference to a world entity (actor, item, token, effect or template).
    EntityRef
}

string_id! {
    /// Identity of a connected user.
    UserId
}

string_id! {
    /// Identity of a replicated message. The primary message id doubles as
    /// the activation id.
    MessageId
}
