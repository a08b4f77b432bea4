//! Strongly-typed identifiers
//!
//! All aggregates are keyed by UUIDs. Parsing from text returns
//! `DomainError::InvalidId` rather than panicking, so an id coming from a
//! request or a config file is validated at the edge.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::errors::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            pub fn parse(s: &str) -> Result<Self, DomainError> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| DomainError::InvalidId {
                        entity: $entity,
                        value: s.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Planning (per-prestation calendar) identifier
    PlanningId,
    "planning"
);
uuid_id!(
    /// Prestation (bookable service) identifier
    PrestationId,
    "prestation"
);
uuid_id!(
    /// Reservation identifier
    ReservationId,
    "reservation"
);
uuid_id!(
    /// Basket identifier
    BasketId,
    "basket"
);
uuid_id!(
    /// Account owning baskets and reservations
    UserId,
    "user"
);
uuid_id!(
    /// Boarded animal
    AnimalId,
    "animal"
);
