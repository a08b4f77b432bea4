//! Planning domain entity

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::ids::{PlanningId, PrestationId};
use crate::domain::DomainResult;
use crate::shared::errors::DomainError;
use crate::shared::time::{days_inclusive, ensure_ordered};

/// Capacity of one prestation on one calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableSlot {
    date: NaiveDate,
    max_capacity: u32,
    reserved_capacity: u32,
}

impl AvailableSlot {
    pub fn new(date: NaiveDate, max_capacity: u32) -> Self {
        Self {
            date,
            max_capacity,
            reserved_capacity: 0,
        }
    }

    /// Rebuild a slot from stored counters, rejecting `reserved > max`.
    pub fn restore(date: NaiveDate, max_capacity: u32, reserved_capacity: u32) -> DomainResult<Self> {
        if reserved_capacity > max_capacity {
            return Err(DomainError::Validation(format!(
                "slot {date}: reserved {reserved_capacity} exceeds max {max_capacity}"
            )));
        }
        Ok(Self {
            date,
            max_capacity,
            reserved_capacity,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    pub fn reserved_capacity(&self) -> u32 {
        self.reserved_capacity
    }

    pub fn available_capacity(&self) -> u32 {
        self.max_capacity.saturating_sub(self.reserved_capacity)
    }

    pub fn can_reserve(&self, quantity: u32) -> bool {
        self.available_capacity() >= quantity
    }

    fn reserve(&mut self, quantity: u32) -> DomainResult<()> {
        if !self.can_reserve(quantity) {
            return Err(DomainError::InsufficientCapacity {
                date: self.date,
                requested: quantity,
                available: self.available_capacity(),
            });
        }
        self.reserved_capacity += quantity;
        Ok(())
    }

    fn release(&mut self, quantity: u32) -> DomainResult<()> {
        self.reserved_capacity = self.reserved_capacity.checked_sub(quantity).ok_or(
            DomainError::InsufficientReserved {
                date: self.date,
                requested: quantity,
                reserved: self.reserved_capacity,
            },
        )?;
        Ok(())
    }
}

/// Read-only view of one day's capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub max_capacity: u32,
    pub reserved_capacity: u32,
    pub available_capacity: u32,
}

impl From<&AvailableSlot> for DayAvailability {
    fn from(slot: &AvailableSlot) -> Self {
        Self {
            date: slot.date,
            max_capacity: slot.max_capacity,
            reserved_capacity: slot.reserved_capacity,
            available_capacity: slot.available_capacity(),
        }
    }
}

/// Outcome of a tolerant multi-day release.
///
/// Days that could not be released are reported, not raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: Vec<NaiveDate>,
    pub skipped: Vec<SkippedRelease>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRelease {
    pub date: NaiveDate,
    pub reason: String,
}

impl ReleaseReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Per-prestation calendar of capacity slots.
///
/// Slots are kept sorted by date with at most one slot per date.
#[derive(Debug, Clone)]
pub struct Planning {
    pub id: PlanningId,
    pub prestation_id: PrestationId,
    pub label: String,
    pub description: Option<String>,
    pub is_active: bool,
    slots: Vec<AvailableSlot>,
    /// Optimistic concurrency token, bumped by the repository on every save
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Planning {
    pub fn new(prestation_id: PrestationId, label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PlanningId::new(),
            prestation_id,
            label: label.into(),
            description: None,
            is_active: true,
            slots: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a planning loaded from storage. Slots may arrive unordered
    /// but duplicated dates are rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: PlanningId,
        prestation_id: PrestationId,
        label: String,
        description: Option<String>,
        is_active: bool,
        mut slots: Vec<AvailableSlot>,
        version: i32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        slots.sort_by_key(|s| s.date);
        if let Some(pair) = slots.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DomainError::Conflict(format!(
                "planning {id} has two slots on {}",
                pair[0].date
            )));
        }
        Ok(Self {
            id,
            prestation_id,
            label,
            description,
            is_active,
            slots,
            version,
            created_at,
            updated_at,
        })
    }

    pub fn slots(&self) -> &[AvailableSlot] {
        &self.slots
    }

    pub fn slot(&self, date: NaiveDate) -> Option<&AvailableSlot> {
        self.position(date).ok().map(|i| &self.slots[i])
    }

    fn position(&self, date: NaiveDate) -> Result<usize, usize> {
        self.slots.binary_search_by_key(&date, |s| s.date)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ── Slot management ────────────────────────────────────────

    /// Plan a new day. Fails if the date already has a slot.
    pub fn add_slot(&mut self, date: NaiveDate, max_capacity: u32) -> DomainResult<()> {
        match self.position(date) {
            Ok(_) => Err(DomainError::Conflict(format!(
                "planning {} already has a slot on {date}",
                self.id
            ))),
            Err(i) => {
                self.slots.insert(i, AvailableSlot::new(date, max_capacity));
                self.touch();
                Ok(())
            }
        }
    }

    /// Plan every missing day in `[start, end]`. Existing slots are left
    /// untouched. Returns how many slots were created.
    pub fn open_range(&mut self, start: NaiveDate, end: NaiveDate, max_capacity: u32) -> DomainResult<usize> {
        ensure_ordered(start, end)?;
        let mut created = 0;
        for date in days_inclusive(start, end) {
            if let Err(i) = self.position(date) {
                self.slots.insert(i, AvailableSlot::new(date, max_capacity));
                created += 1;
            }
        }
        if created > 0 {
            self.touch();
        }
        Ok(created)
    }

    /// Change a day's maximum. Cannot drop below what is already reserved.
    pub fn set_slot_capacity(&mut self, date: NaiveDate, max_capacity: u32) -> DomainResult<()> {
        let i = self.position(date).map_err(|_| DomainError::SlotNotFound(date))?;
        let slot = &mut self.slots[i];
        if max_capacity < slot.reserved_capacity {
            return Err(DomainError::Validation(format!(
                "slot {date}: max {max_capacity} below reserved {}",
                slot.reserved_capacity
            )));
        }
        slot.max_capacity = max_capacity;
        self.touch();
        Ok(())
    }

    /// Remove an unused day.
    pub fn remove_slot(&mut self, date: NaiveDate) -> DomainResult<AvailableSlot> {
        let i = self.position(date).map_err(|_| DomainError::SlotNotFound(date))?;
        if self.slots[i].reserved_capacity > 0 {
            return Err(DomainError::Conflict(format!(
                "slot {date} still holds {} reserved",
                self.slots[i].reserved_capacity
            )));
        }
        let removed = self.slots.remove(i);
        self.touch();
        Ok(removed)
    }

    /// Per-day capacity for the planned days in `[start, end]`.
    pub fn availability(&self, start: NaiveDate, end: NaiveDate) -> Vec<DayAvailability> {
        let from = match self.position(start) {
            Ok(i) | Err(i) => i,
        };
        self.slots[from..]
            .iter()
            .take_while(|s| s.date <= end)
            .map(DayAvailability::from)
            .collect()
    }

    /// Whether every day of `[start, end]` can take `quantity` more.
    pub fn is_available(&self, start: NaiveDate, end: NaiveDate, quantity: u32) -> bool {
        start <= end
            && days_inclusive(start, end)
                .all(|d| self.slot(d).is_some_and(|s| s.can_reserve(quantity)))
    }

    // ── Capacity accounting ────────────────────────────────────

    /// Reserve `quantity` on every day of `[date_start, date_end]`.
    ///
    /// All-or-nothing: every day is checked before any counter moves, so a
    /// failure leaves the planning unchanged.
    pub fn reserve_slots(
        &mut self,
        date_start: NaiveDate,
        date_end: NaiveDate,
        quantity: u32,
    ) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::Validation("quantity must be positive".into()));
        }
        ensure_ordered(date_start, date_end)?;

        let mut indices = Vec::new();
        for date in days_inclusive(date_start, date_end) {
            let i = self.position(date).map_err(|_| DomainError::SlotNotFound(date))?;
            let slot = &self.slots[i];
            if !slot.can_reserve(quantity) {
                return Err(DomainError::InsufficientCapacity {
                    date,
                    requested: quantity,
                    available: slot.available_capacity(),
                });
            }
            indices.push(i);
        }

        for i in indices {
            self.slots[i].reserve(quantity)?;
        }
        self.touch();
        Ok(())
    }

    /// Release `quantity` on a single day.
    ///
    /// Fails without mutating when the day has no slot or fewer than
    /// `quantity` reserved.
    pub fn cancel_reservation(&mut self, date: NaiveDate, quantity: u32) -> DomainResult<()> {
        let i = self.position(date).map_err(|_| DomainError::SlotNotFound(date))?;
        self.slots[i].release(quantity)?;
        self.touch();
        Ok(())
    }

    /// Release `quantity` on every day of `[date_start, date_end]`,
    /// tolerating days that cannot be released (missing slot, counter
    /// already lower than `quantity`). Those days are listed in the report.
    pub fn cancel_reservation_range(
        &mut self,
        date_start: NaiveDate,
        date_end: NaiveDate,
        quantity: u32,
    ) -> ReleaseReport {
        let mut report = ReleaseReport::default();
        for date in days_inclusive(date_start, date_end) {
            match self.cancel_reservation(date, quantity) {
                Ok(()) => report.released.push(date),
                Err(e) => report.skipped.push(SkippedRelease {
                    date,
                    reason: e.to_string(),
                }),
            }
        }
        report
    }

    pub fn total_reserved(&self) -> u64 {
        self.slots.iter().map(|s| u64::from(s.reserved_capacity)).sum()
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.touch();
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.touch();
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn planning_with(days: &[(u32, u32)]) -> Planning {
        let mut p = Planning::new(PrestationId::new(), "Boarding - large dogs");
        for (day, max) in days {
            p.add_slot(d(*day), *max).unwrap();
        }
        p
    }

    fn reserved(p: &Planning, day: u32) -> u32 {
        p.slot(d(day)).unwrap().reserved_capacity()
    }

    #[test]
    fn reserve_then_cancel_single_day() {
        let mut p = planning_with(&[(1, 3)]);

        p.reserve_slots(d(1), d(1), 2).unwrap();
        let slot = p.slot(d(1)).unwrap();
        assert_eq!(slot.reserved_capacity(), 2);
        assert_eq!(slot.available_capacity(), 1);

        p.cancel_reservation(d(1), 2).unwrap();
        let slot = p.slot(d(1)).unwrap();
        assert_eq!(slot.reserved_capacity(), 0);
        assert_eq!(slot.available_capacity(), 3);
    }

    #[test]
    fn reserve_covers_every_day_in_range() {
        let mut p = planning_with(&[(1, 2), (2, 2), (3, 2)]);
        p.reserve_slots(d(1), d(3), 1).unwrap();
        assert_eq!((reserved(&p, 1), reserved(&p, 2), reserved(&p, 3)), (1, 1, 1));
    }

    #[test]
    fn reserve_is_all_or_nothing_on_capacity() {
        let mut p = planning_with(&[(1, 2), (2, 1), (3, 2)]);
        p.reserve_slots(d(2), d(2), 1).unwrap();

        let err = p.reserve_slots(d(1), d(3), 1).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientCapacity { date, requested: 1, available: 0 } if date == d(2)
        ));
        assert_eq!((reserved(&p, 1), reserved(&p, 2), reserved(&p, 3)), (0, 1, 0));
    }

    #[test]
    fn reserve_is_all_or_nothing_on_missing_day() {
        let mut p = planning_with(&[(1, 2), (3, 2)]);
        let err = p.reserve_slots(d(1), d(3), 1).unwrap_err();
        assert!(matches!(err, DomainError::SlotNotFound(date) if date == d(2)));
        assert_eq!(reserved(&p, 1), 0);
        assert_eq!(reserved(&p, 3), 0);
    }

    #[test]
    fn reserve_rejects_zero_quantity_and_reversed_range() {
        let mut p = planning_with(&[(1, 2), (2, 2)]);
        assert!(matches!(p.reserve_slots(d(1), d(2), 0), Err(DomainError::Validation(_))));
        assert!(matches!(p.reserve_slots(d(2), d(1), 1), Err(DomainError::Validation(_))));
    }

    #[test]
    fn cancel_more_than_reserved_does_not_go_negative() {
        let mut p = planning_with(&[(1, 3)]);
        p.reserve_slots(d(1), d(1), 1).unwrap();

        let err = p.cancel_reservation(d(1), 2).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientReserved { reserved: 1, .. }));
        assert_eq!(reserved(&p, 1), 1);
        assert_eq!(p.slot(d(1)).unwrap().available_capacity(), 2);
    }

    #[test]
    fn cancel_on_unplanned_day_is_an_error() {
        let mut p = planning_with(&[(1, 3)]);
        assert!(matches!(p.cancel_reservation(d(9), 1), Err(DomainError::SlotNotFound(_))));
    }

    #[test]
    fn range_cancel_tolerates_missing_and_empty_days() {
        let mut p = planning_with(&[(1, 2), (2, 2), (4, 2)]);
        p.reserve_slots(d(1), d(2), 1).unwrap();

        let report = p.cancel_reservation_range(d(1), d(4), 1);
        assert_eq!(report.released, vec![d(1), d(2)]);
        let skipped: Vec<_> = report.skipped.iter().map(|s| s.date).collect();
        assert_eq!(skipped, vec![d(3), d(4)]);
        assert!(!report.is_complete());
        assert_eq!(p.total_reserved(), 0);
    }

    #[test]
    fn available_never_negative_over_mixed_sequence() {
        let mut p = planning_with(&[(1, 2), (2, 2)]);
        let ops: &[(bool, u32, u32, u32)] = &[
            (true, 1, 2, 1),
            (true, 1, 1, 1),
            (true, 1, 2, 1),
            (false, 1, 2, 3),
            (false, 2, 2, 1),
            (true, 2, 2, 2),
            (false, 1, 2, 1),
        ];
        for &(reserve, from, to, q) in ops {
            if reserve {
                let _ = p.reserve_slots(d(from), d(to), q);
            } else {
                let _ = p.cancel_reservation_range(d(from), d(to), q);
            }
            for slot in p.slots() {
                assert!(slot.reserved_capacity() <= slot.max_capacity());
                assert_eq!(
                    slot.available_capacity(),
                    slot.max_capacity() - slot.reserved_capacity()
                );
            }
        }
    }

    #[test]
    fn slots_stay_sorted_and_unique() {
        let mut p = planning_with(&[(3, 1), (1, 1)]);
        p.add_slot(d(2), 1).unwrap();
        assert!(matches!(p.add_slot(d(2), 5), Err(DomainError::Conflict(_))));
        let dates: Vec<_> = p.slots().iter().map(|s| s.date()).collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
    }

    #[test]
    fn open_range_only_fills_gaps() {
        let mut p = planning_with(&[(2, 9)]);
        let created = p.open_range(d(1), d(3), 4).unwrap();
        assert_eq!(created, 2);
        assert_eq!(p.slot(d(2)).unwrap().max_capacity(), 9);
        assert_eq!(p.slot(d(3)).unwrap().max_capacity(), 4);
    }

    #[test]
    fn capacity_cannot_drop_below_reserved() {
        let mut p = planning_with(&[(1, 3)]);
        p.reserve_slots(d(1), d(1), 2).unwrap();
        assert!(p.set_slot_capacity(d(1), 1).is_err());
        p.set_slot_capacity(d(1), 2).unwrap();
        assert_eq!(p.slot(d(1)).unwrap().available_capacity(), 0);
    }

    #[test]
    fn reserved_slot_cannot_be_removed() {
        let mut p = planning_with(&[(1, 3), (2, 3)]);
        p.reserve_slots(d(1), d(1), 1).unwrap();
        assert!(matches!(p.remove_slot(d(1)), Err(DomainError::Conflict(_))));
        assert_eq!(p.remove_slot(d(2)).unwrap().date(), d(2));
    }

    #[test]
    fn availability_window_and_check() {
        let mut p = planning_with(&[(1, 1), (2, 2), (5, 1)]);
        p.reserve_slots(d(1), d(1), 1).unwrap();

        let view = p.availability(d(2), d(5));
        let dates: Vec<_> = view.iter().map(|a| a.date).collect();
        assert_eq!(dates, vec![d(2), d(5)]);
        assert!(p.is_available(d(2), d(2), 2));
        assert!(!p.is_available(d(1), d(2), 1));
        assert!(!p.is_available(d(2), d(3), 1));
    }

    #[test]
    fn restore_rejects_duplicate_dates() {
        let slots = vec![AvailableSlot::new(d(1), 1), AvailableSlot::new(d(1), 2)];
        let now = Utc::now();
        let result = Planning::restore(
            PlanningId::new(),
            PrestationId::new(),
            "x".into(),
            None,
            true,
            slots,
            0,
            now,
            now,
        );
        assert!(result.is_err());
        assert!(AvailableSlot::restore(d(1), 1, 2).is_err());
    }
}
