//! Identifier types used throughout the Folio core.
//!
//! Uses UUID v7 for time-ordered, globally unique identifiers. Area
//! singletons derive their document id from the area slug (UUID v5) so the
//! same area always resolves to the same row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new identifier with the current timestamp.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an identifier from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier from a string.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
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

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a document (the root row of a collection or area).
    DocumentId
);

uuid_id!(
    /// Unique identifier for a version row of a versioned document.
    VersionId
);

uuid_id!(
    /// Unique identifier for a relation, block or tree row.
    RowId
);

impl DocumentId {
    /// Deterministic id for the singleton document of an area.
    #[must_use]
    pub fn for_area(slug: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("folio:area:{slug}").as_bytes()))
    }
}
