//! Strongly-typed identifiers for weft entities.
//!
//! Relational identifiers (`DatasetId`, `RecordId`) are ULIDs:
//!
//! - **Strongly typed**: prevents mixing up ID kinds at compile time
//! - **Lexicographically sortable**: ULIDs encode creation time, and
//!   generation goes through a process-wide monotonic generator so IDs
//!   minted within the same millisecond still sort in creation order.
//!   Ordered maps keyed by these IDs iterate in insertion order.
//! - **Globally unique**: no coordination required for generation
//!
//! Blob identifiers are different: the blob store assigns them, and weft
//! treats them as opaque strings. See [`crate::blob::BlobId`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, OnceLock, PoisonError};
use ulid::{Generator, Ulid};

use crate::error::{Error, Result};

/// Mints the next ULID from a process-wide monotonic generator.
///
/// Within a single millisecond the generator increments the random
/// component instead of re-rolling it, so consecutive IDs compare in
/// creation order. If that component overflows (after 2^80 IDs in one
/// millisecond) the ID falls back to a fresh random ULID.
fn next_ulid() -> Ulid {
    static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();
    GENERATOR
        .get_or_init(|| Mutex::new(Generator::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .generate()
        .unwrap_or_else(|_| Ulid::new())
}

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Generates a new unique identifier.
            ///
            /// IDs generated by the same process sort in creation order,
            /// even within a single millisecond.
            #[must_use]
            pub fn generate() -> Self {
                Self(next_ulid())
            }

            /// Creates an identifier from a raw ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the creation timestamp encoded in the ID.
            #[must_use]
            pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
                let ms = self.0.timestamp_ms();
                i64::try_from(ms)
                    .ok()
                    .and_then(chrono::DateTime::from_timestamp_millis)
                    .unwrap_or_else(chrono::Utc::now)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Ulid::from_string(s).map(Self).map_err(|e| Error::InvalidId {
                    message: format!(concat!("invalid ", $label, " ID '{}': {}"), s, e),
                })
            }
        }
    };
}

ulid_id! {
    /// A unique identifier for a dataset.
    ///
    /// Datasets are the aggregate containers that individual records are
    /// ingested into and consolidated under.
    DatasetId, "dataset"
}

ulid_id! {
    /// A unique identifier for an ingested record awaiting consolidation.
    RecordId, "record"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_and_unique() {
        let a = DatasetId::generate();
        let b = DatasetId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn id_roundtrips_through_string() {
        let id = RecordId::generate();
        let parsed: RecordId = id.to_string().parse().expect("valid ULID");
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_id_is_rejected() {
        let err = "not-a-ulid".parse::<DatasetId>().unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));
    }

    #[test]
    fn ids_generated_back_to_back_sort_in_creation_order() {
        let ids: Vec<RecordId> = (0..256).map(|_| RecordId::generate()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "same-millisecond IDs must stay ordered");
    }

    #[test]
    fn serde_is_transparent() {
        let id = DatasetId::generate();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{id}\""));
    }
}
