//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the pipeline has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient database indexing.
//!
//! The `new()` constructors exist for app-side generation (scraper inserts,
//! task enqueue, tests); rows created by Postgres defaults use `uuidv7()`.

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
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
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
    /// Unique identifier for a scraped source (a raw post or article).
    SourceId
}

define_id! {
    /// Unique identifier for a fact-checked claim.
    ClaimId
}

define_id! {
    /// Unique identifier for an evidence row attached to a claim.
    EvidenceId
}

define_id! {
    /// Unique identifier for a canonicalized named entity.
    EntityId
}

define_id! {
    /// Unique identifier for a topic in the fixed taxonomy.
    TopicId
}

define_id! {
    /// Unique identifier for a prediction market.
    MarketId
}

define_id! {
    /// Unique identifier for a trade placed on a market.
    TradeId
}

define_id! {
    /// Unique identifier for a prediction factor (agent assessment record).
    FactorId
}

define_id! {
    /// Unique identifier for a trending topic snapshot row.
    TrendId
}

define_id! {
    /// Unique identifier for a task on the task bus.
    TaskId
}

define_id! {
    /// Unique identifier for a credit account (user or system actor).
    AccountId
}

define_id! {
    /// Unique identifier for an operator notification.
    NotificationId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let source = SourceId::new();
        let claim = ClaimId::new();
        // These are different types -- the compiler enforces no mixing.
        assert_ne!(source.into_inner(), Uuid::nil());
        assert_ne!(claim.into_inner(), Uuid::nil());
    }

    #[test]
    fn ids_are_time_ordered() {
        let first = TaskId::new();
        let second = TaskId::new();
        // UUID v7 embeds a millisecond timestamp, so later ids compare
        // greater or equal (equal within the same millisecond).
        assert!(second >= first);
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = MarketId::new();
        let json = serde_json::to_string(&id).unwrap_or_default();
        let back: MarketId = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(id, back);
    }

    #[test]
    fn id_display_matches_uuid() {
        let uuid = Uuid::now_v7();
        let id = SourceId::from(uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }
}
