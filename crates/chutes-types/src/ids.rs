//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Players and transport connections each get a strongly-typed ID so the
//! two can never be mixed at compile time. IDs use UUID v4: they are
//! handed to untrusted clients and must not be guessable from earlier
//! values.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a player within a game session.
    PlayerId
}

define_id! {
    /// Unique identifier for an attached observer connection
    /// (push socket or poll client).
    ConnectionId
}

/// A short human-typeable game session code.
///
/// Codes are 6 characters drawn from an alphabet that excludes the
/// ambiguous characters `I`, `L`, `O`, `0`, and `1`. Lookups are
/// case-insensitive: codes normalize to uppercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameCode(String);

impl GameCode {
    /// Normalize a client-supplied code (trim + uppercase).
    pub fn normalize(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    /// Wrap an already-canonical code string.
    ///
    /// Used by the registry's code generator, which only produces
    /// uppercase alphabet characters.
    pub fn from_canonical(code: String) -> Self {
        Self(code)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the code is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for GameCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_values() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = PlayerId::new();
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<PlayerId, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert!(restored.is_ok());
    }

    #[test]
    fn game_code_normalizes_case_and_whitespace() {
        let code = GameCode::normalize("  ab2cd9 ");
        assert_eq!(code.as_str(), "AB2CD9");
    }

    #[test]
    fn game_code_serializes_as_plain_string() {
        let code = GameCode::from_canonical(String::from("XYZ234"));
        let json = serde_json::to_string(&code).ok();
        assert_eq!(json.as_deref(), Some("\"XYZ234\""));
    }
}
