//! Reservation domain entity

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::ids::{AnimalId, PlanningId, PrestationId, ReservationId, UserId};
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;
use crate::shared::time::{day_count, ensure_ordered};

/// How long a reservation may stay unpaid before the expiry worker
/// releases its capacity.
pub const PENDING_PAYMENT_TTL_MINUTES: i64 = 20;

pub fn pending_payment_ttl() -> Duration {
    Duration::minutes(PENDING_PAYMENT_TTL_MINUTES)
}

/// Reservation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationStatus {
    /// Created, capacity held, waiting for payment
    Pending,
    /// Paid
    Validated,
    /// The animal is currently boarded
    InProgress,
    Completed,
    Cancelled,
    /// Not paid in time
    Expired,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 6] = [
        Self::Pending,
        Self::Validated,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Validated => "Validated",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Expired => "Expired",
        }
    }

    /// Statuses in which the reservation occupies planning capacity
    pub fn holds_capacity(&self) -> bool {
        matches!(self, Self::Pending | Self::Validated | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }
}

impl FromStr for ReservationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::Validation(format!("unknown reservation status: {s}")))
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Boarding of one animal on one prestation over an inclusive date range.
///
/// Holds one unit of capacity per day on the prestation's planning while
/// `status.holds_capacity()`.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub animal_id: AnimalId,
    pub prestation_id: PrestationId,
    pub planning_id: PlanningId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ReservationStatus,
    /// Total in minor currency units
    pub total_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Capacity units a reservation takes on each day of its range
    pub const UNITS_PER_DAY: u32 = 1;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        animal_id: AnimalId,
        prestation_id: PrestationId,
        planning_id: PlanningId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        total_price: i64,
    ) -> DomainResult<Self> {
        ensure_ordered(start_date, end_date)?;
        if total_price < 0 {
            return Err(DomainError::Validation("total price cannot be negative".into()));
        }
        let now = Utc::now();
        Ok(Self {
            id: ReservationId::new(),
            user_id,
            animal_id,
            prestation_id,
            planning_id,
            start_date,
            end_date,
            status: ReservationStatus::Pending,
            total_price,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn days(&self) -> u32 {
        day_count(self.start_date, self.end_date)
    }

    pub fn holds_capacity(&self) -> bool {
        self.status.holds_capacity()
    }

    /// Unpaid past the payment window at `now`
    pub fn is_payment_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.created_at + pending_payment_ttl() < now
    }

    fn transition(&mut self, from: &[ReservationStatus], to: ReservationStatus) -> DomainResult<()> {
        if !from.contains(&self.status) {
            return Err(DomainError::Validation(format!(
                "reservation {} cannot go from {} to {}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Payment received
    pub fn validate(&mut self) -> DomainResult<()> {
        self.transition(&[ReservationStatus::Pending], ReservationStatus::Validated)
    }

    /// Animal checked in
    pub fn start(&mut self) -> DomainResult<()> {
        self.transition(&[ReservationStatus::Validated], ReservationStatus::InProgress)
    }

    /// Animal checked out
    pub fn complete(&mut self) -> DomainResult<()> {
        self.transition(&[ReservationStatus::InProgress], ReservationStatus::Completed)
    }

    /// Cancel. Returns `true` when capacity must be released,
    /// `false` when the reservation was already cancelled.
    pub fn cancel(&mut self) -> DomainResult<bool> {
        if self.status == ReservationStatus::Cancelled {
            return Ok(false);
        }
        self.transition(
            &[ReservationStatus::Pending, ReservationStatus::Validated],
            ReservationStatus::Cancelled,
        )?;
        Ok(true)
    }

    /// Expire an unpaid reservation. Returns `true` if it moved from
    /// `Pending` to `Expired`; any other status is left alone.
    pub fn expire(&mut self) -> bool {
        if self.status != ReservationStatus::Pending {
            return false;
        }
        self.status = ReservationStatus::Expired;
        self.updated_at = Utc::now();
        true
    }
}

// ── Tests ──────────────────────────────────────────────────────
