//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the platform.
//! Each identifier is a distinct type — you cannot pass a [`SubjectId`]
//! where an [`OrgId`] is expected.
//!
//! All identifiers are UUID-backed and always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// A unique identifier for a data subject (a citizen whose personal
    /// data the platform mediates access to).
    SubjectId
}

uuid_id! {
    /// A unique identifier for an organization registered in the
    /// organization directory.
    OrgId
}

uuid_id! {
    /// A unique identifier for a consent type (a named category of
    /// personal data, e.g. "location").
    ConsentTypeId
}

uuid_id! {
    /// A unique identifier for an access request.
    RequestId
}

uuid_id! {
    /// A unique identifier for a persisted compliance audit record.
    AuditId
}

uuid_id! {
    /// A unique identifier for a persisted violation report.
    ViolationId
}
