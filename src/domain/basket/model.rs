//! Basket domain entity

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::ids::{BasketId, ReservationId, UserId};
use crate::domain::prestation::Prestation;
use crate::domain::reservation::Reservation;
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;

/// Default age after which an unpaid basket is expired
pub const DEFAULT_BASKET_TTL_MINUTES: i64 = 30;

/// Basket status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasketStatus {
    /// Accepting items
    Active,
    /// Checked out, waiting for the payment provider
    PendingPayment,
    Paid,
    Expired,
    /// Abandoned by its owner
    Cancelled,
}

impl BasketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::PendingPayment => "PendingPayment",
            Self::Paid => "Paid",
            Self::Expired => "Expired",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Open baskets are unpaid and still hold their reservations' capacity.
    /// A user has at most one.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::PendingPayment)
    }
}

impl FromStr for BasketStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "PendingPayment" => Ok(Self::PendingPayment),
            "Paid" => Ok(Self::Paid),
            "Expired" => Ok(Self::Expired),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!("unknown basket status: {other}"))),
        }
    }
}

impl std::fmt::Display for BasketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reservation in a basket, with a display snapshot taken when it was
/// added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasketItem {
    pub reservation_id: ReservationId,
    pub prestation_label: String,
    pub price_per_day: i64,
    pub line_total: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub added_at: DateTime<Utc>,
}

impl BasketItem {
    pub fn snapshot(reservation: &Reservation, prestation: &Prestation) -> Self {
        Self {
            reservation_id: reservation.id,
            prestation_label: prestation.label.clone(),
            price_per_day: prestation.price_per_day,
            line_total: reservation.total_price,
            start_date: reservation.start_date,
            end_date: reservation.end_date,
            added_at: Utc::now(),
        }
    }
}

/// A user's cart of reservations pending payment
#[derive(Debug, Clone)]
pub struct Basket {
    pub id: BasketId,
    pub user_id: UserId,
    pub status: BasketStatus,
    items: Vec<BasketItem>,
    /// Sum of item totals, minor currency units
    pub total_amount: i64,
    pub item_count: u32,
    /// Reference handed out by the payment provider at checkout
    pub payment_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Basket {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: BasketId::new(),
            user_id,
            status: BasketStatus::Active,
            items: Vec::new(),
            total_amount: 0,
            item_count: 0,
            payment_reference: None,
            paid_at: None,
            expired_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a basket loaded from storage. Totals are recomputed from
    /// the items.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: BasketId,
        user_id: UserId,
        status: BasketStatus,
        items: Vec<BasketItem>,
        payment_reference: Option<String>,
        paid_at: Option<DateTime<Utc>>,
        expired_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut basket = Self {
            id,
            user_id,
            status,
            items,
            total_amount: 0,
            item_count: 0,
            payment_reference,
            paid_at,
            expired_at,
            created_at,
            updated_at,
        };
        basket.recompute_totals();
        basket
    }

    pub fn items(&self) -> &[BasketItem] {
        &self.items
    }

    pub fn reservation_ids(&self) -> impl Iterator<Item = ReservationId> + '_ {
        self.items.iter().map(|i| i.reservation_id)
    }

    pub fn contains(&self, reservation_id: ReservationId) -> bool {
        self.items.iter().any(|i| i.reservation_id == reservation_id)
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Open and created more than `ttl` before `now`
    pub fn is_stale(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.is_open() && self.created_at + ttl < now
    }

    fn recompute_totals(&mut self) {
        self.total_amount = self
            .items
            .iter()
            .map(|i| i.line_total)
            .fold(0i64, i64::saturating_add);
        self.item_count = self.items.len() as u32;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn ensure_status(&self, expected: BasketStatus, action: &str) -> DomainResult<()> {
        if self.status != expected {
            return Err(DomainError::Conflict(format!(
                "cannot {action} basket {} in status {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    pub fn add_item(&mut self, item: BasketItem) -> DomainResult<()> {
        self.ensure_status(BasketStatus::Active, "add to")?;
        if self.contains(item.reservation_id) {
            return Err(DomainError::Conflict(format!(
                "reservation {} already in basket {}",
                item.reservation_id, self.id
            )));
        }
        self.items.push(item);
        self.recompute_totals();
        self.touch();
        Ok(())
    }

    /// Drop an item. Allowed while the basket is open.
    pub fn remove_item(&mut self, reservation_id: ReservationId) -> DomainResult<BasketItem> {
        if !self.is_open() {
            return Err(DomainError::Conflict(format!(
                "cannot remove from basket {} in status {}",
                self.id, self.status
            )));
        }
        let i = self
            .items
            .iter()
            .position(|i| i.reservation_id == reservation_id)
            .ok_or_else(|| DomainError::not_found("BasketItem", reservation_id))?;
        let item = self.items.remove(i);
        self.recompute_totals();
        self.touch();
        Ok(item)
    }

    /// Freeze the basket for payment.
    pub fn checkout(&mut self, payment_reference: impl Into<String>) -> DomainResult<()> {
        self.ensure_status(BasketStatus::Active, "check out")?;
        if self.items.is_empty() {
            return Err(DomainError::Validation(format!("basket {} is empty", self.id)));
        }
        self.payment_reference = Some(payment_reference.into());
        self.status = BasketStatus::PendingPayment;
        self.touch();
        Ok(())
    }

    pub fn confirm_payment(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(BasketStatus::PendingPayment, "confirm payment of")?;
        self.status = BasketStatus::Paid;
        self.paid_at = Some(now);
        self.touch();
        Ok(())
    }

    /// Expire an unpaid basket. Returns `false` if it was not open.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.status = BasketStatus::Expired;
        self.expired_at = Some(now);
        self.touch();
        true
    }

    /// Owner gave up on the basket.
    pub fn abandon(&mut self) -> DomainResult<()> {
        if !self.is_open() {
            return Err(DomainError::Conflict(format!(
                "cannot abandon basket {} in status {}",
                self.id, self.status
            )));
        }
        self.status = BasketStatus::Cancelled;
        self.touch();
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────
