//! Type-safe identifiers for settlement records.
//!
//! [`EventId`], [`ShareId`] and [`BatchId`] wrap [`uuid::Uuid`] (v4) so the
//! engine's own record identifiers cannot be confused with each other.
//! [`CreatorId`] wraps the opaque creator identifier owned by the account
//! subsystem; the engine never parses or generates it.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a settlement event.
    ///
    /// Generated once at ingestion time and immutable thereafter. Reversal
    /// events reference their original PAYMENT through this id.
    EventId
);

uuid_id!(
    /// Unique identifier for a creator or growth share row.
    ShareId
);

uuid_id!(
    /// Unique identifier for a payout batch.
    BatchId
);

/// Opaque creator identifier owned by the account subsystem.
///
/// Keys payees in the distribution ledger and orders remix chains. The
/// engine treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreatorId(String);

impl CreatorId {
    /// Wraps a raw creator identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CreatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CreatorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CreatorId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<CreatorId> for String {
    fn from(id: CreatorId) -> Self {
        id.0
    }
}
