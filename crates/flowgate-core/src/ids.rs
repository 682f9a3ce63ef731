//! Branded ID newtypes for type safety.
//!
//! Every addressable entity in the gateway has a distinct ID type implemented
//! as a newtype wrapper around `String`. This prevents accidentally passing a
//! session ID where a tool-call ID is expected.
//!
//! All IDs are UUID v7 (time-ordered) generated via [`uuid::Uuid::now_v7`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for an agent session.
    SessionId
}

branded_id! {
    /// Unique identifier for a pending approval request.
    ApprovalId
}

branded_id! {
    /// Unique identifier for a connected WebSocket client.
    ConnectionId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_new_is_uuid_v7() {
        let id = SessionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn from_string() {
        let id = ApprovalId::from_string("custom-id".to_owned());
        assert_eq!(id.as_str(), "custom-id");
    }

    #[test]
    fn from_str_ref() {
        let id = SessionId::from("abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn deref_to_str() {
        let id = ApprovalId::from("hello");
        let s: &str = &id;
        assert_eq!(s, "hello");
    }

    #[test]
    fn display() {
        let id = ApprovalId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn into_string() {
        let id = SessionId::from("convert");
        let s: String = id.into();
        assert_eq!(s, "convert");
    }

    #[test]
    fn serde_roundtrip() {
        let id = ConnectionId::from("serde-test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"serde-test\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn hash_and_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = SessionId::from("same");
        let _ = set.insert(id.clone());
        let _ = set.insert(id.clone());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn ord_matches_creation_order() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert!(a < b, "UUIDv7 ids sort in creation order");
    }

    #[test]
    fn default_creates_new() {
        let id1 = ApprovalId::default();
        let id2 = ApprovalId::default();
        assert_ne!(id1, id2, "default should create unique IDs");
    }

    #[test]
    fn into_inner() {
        let id = SessionId::from("inner-test");
        let inner = id.into_inner();
        assert_eq!(inner, "inner-test");
    }
}
