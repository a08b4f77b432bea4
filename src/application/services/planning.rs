//! Planning service
//!
//! Load-mutate-save around the planning aggregate. Every save is
//! version-checked by the repository; a lost race is retried with backoff.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::domain::planning::ReleaseReport;
use crate::domain::{
    DayAvailability, DomainError, DomainResult, Planning, PlanningId, PrestationId,
    RepositoryProvider, Reservation, ReservationStatus,
};
use crate::shared::retry::{retry_with_backoff, RetryConfig};
use crate::shared::time::day_count;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePlanningCommand {
    pub prestation_id: PrestationId,
    #[validate(length(min = 1, max = 120, message = "label must be 1–120 characters"))]
    pub label: String,
    #[validate(length(max = 2000, message = "description is too long"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OpenSlotsCommand {
    pub planning_id: PlanningId,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    #[validate(range(min = 1, max = 10_000, message = "max_capacity must be 1–10000"))]
    pub max_capacity: u32,
}

pub struct PlanningService {
    repos: Arc<dyn RepositoryProvider>,
    retry: RetryConfig,
}

impl PlanningService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            repos,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create the planning of a prestation. A prestation has at most one
    /// active planning.
    pub async fn create_planning(&self, cmd: CreatePlanningCommand) -> DomainResult<Planning> {
        cmd.validate()?;

        if self
            .repos
            .prestations()
            .find_by_id(cmd.prestation_id)
            .await?
            .is_none()
        {
            return Err(DomainError::not_found("Prestation", cmd.prestation_id));
        }
        if let Some(existing) = self
            .repos
            .plannings()
            .find_active_for_prestation(cmd.prestation_id)
            .await?
        {
            return Err(DomainError::Conflict(format!(
                "prestation {} already has active planning {}",
                cmd.prestation_id, existing.id
            )));
        }

        let mut planning = Planning::new(cmd.prestation_id, cmd.label);
        planning.description = cmd.description;
        self.repos.plannings().save(planning.clone()).await?;

        info!(planning_id = %planning.id, prestation_id = %planning.prestation_id, "Planning created");
        Ok(planning)
    }

    pub async fn get(&self, id: PlanningId) -> DomainResult<Planning> {
        self.repos
            .plannings()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Planning", id))
    }

    /// Active planning of a prestation
    pub async fn for_prestation(&self, prestation_id: PrestationId) -> DomainResult<Planning> {
        self.repos
            .plannings()
            .find_active_for_prestation(prestation_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Planning",
                field: "prestation_id",
                value: prestation_id.to_string(),
            })
    }

    pub async fn availability(
        &self,
        prestation_id: PrestationId,
        date_start: NaiveDate,
        date_end: NaiveDate,
    ) -> DomainResult<Vec<DayAvailability>> {
        let planning = self.for_prestation(prestation_id).await?;
        Ok(planning.availability(date_start, date_end))
    }

    /// Plan every missing day of a range. Returns the number of new slots.
    pub async fn open_slots(&self, cmd: OpenSlotsCommand) -> DomainResult<usize> {
        cmd.validate()?;
        let (_, created) = self
            .mutate(cmd.planning_id, "open_slots", |p| {
                p.open_range(cmd.date_start, cmd.date_end, cmd.max_capacity)
            })
            .await?;
        info!(planning_id = %cmd.planning_id, created, "Slots opened");
        Ok(created)
    }

    pub async fn set_slot_capacity(
        &self,
        planning_id: PlanningId,
        date: NaiveDate,
        max_capacity: u32,
    ) -> DomainResult<Planning> {
        let (planning, ()) = self
            .mutate(planning_id, "set_slot_capacity", |p| {
                p.set_slot_capacity(date, max_capacity)
            })
            .await?;
        Ok(planning)
    }

    pub async fn remove_slot(&self, planning_id: PlanningId, date: NaiveDate) -> DomainResult<Planning> {
        let (planning, _) = self
            .mutate(planning_id, "remove_slot", |p| p.remove_slot(date))
            .await?;
        Ok(planning)
    }

    pub async fn set_active(&self, planning_id: PlanningId, active: bool) -> DomainResult<Planning> {
        let (planning, ()) = self
            .mutate(planning_id, "set_active", |p| {
                if active {
                    p.activate();
                } else {
                    p.deactivate();
                }
                Ok(())
            })
            .await?;
        Ok(planning)
    }

    /// Reserve `quantity` on every day of the range, all or nothing.
    pub async fn reserve_slots(
        &self,
        planning_id: PlanningId,
        date_start: NaiveDate,
        date_end: NaiveDate,
        quantity: u32,
    ) -> DomainResult<Planning> {
        let (planning, ()) = self
            .mutate(planning_id, "reserve_slots", |p| {
                p.reserve_slots(date_start, date_end, quantity)
            })
            .await?;
        let units = u64::from(quantity) * u64::from(day_count(date_start, date_end));
        metrics::counter!("boarding_slots_reserved_total").increment(units);
        debug!(%planning_id, %date_start, %date_end, quantity, "Slots reserved");
        Ok(planning)
    }

    /// Release `quantity` on a single day.
    pub async fn cancel_reservation(
        &self,
        planning_id: PlanningId,
        date: NaiveDate,
        quantity: u32,
    ) -> DomainResult<()> {
        self.mutate(planning_id, "cancel_reservation", |p| {
            p.cancel_reservation(date, quantity)
        })
        .await?;
        debug!(%planning_id, %date, quantity, "Slot released");
        Ok(())
    }

    /// Release `quantity` on every day of the range, skipping days that
    /// cannot be released. Skipped days are logged and reported.
    pub async fn release_range(
        &self,
        planning_id: PlanningId,
        date_start: NaiveDate,
        date_end: NaiveDate,
        quantity: u32,
    ) -> DomainResult<ReleaseReport> {
        let (_, report) = self
            .mutate(planning_id, "release_range", |p| {
                Ok(p.cancel_reservation_range(date_start, date_end, quantity))
            })
            .await?;
        for skipped in &report.skipped {
            warn!(
                %planning_id,
                date = %skipped.date,
                reason = %skipped.reason,
                "Day skipped while releasing capacity"
            );
        }
        Ok(report)
    }

    /// Give back the capacity held by `reservation`.
    pub async fn release_reservation(&self, reservation: &Reservation) -> DomainResult<ReleaseReport> {
        self.release_range(
            reservation.planning_id,
            reservation.start_date,
            reservation.end_date,
            Reservation::UNITS_PER_DAY,
        )
        .await
    }

    /// Release the capacity of a reservation whose status the caller just
    /// moved away from `previous`. If the release fails for a transient
    /// reason the reservation is moved back to `previous`, so that whichever
    /// flow claimed it can claim it again later.
    pub async fn release_claimed(
        &self,
        reservation: &Reservation,
        previous: ReservationStatus,
    ) -> DomainResult<ReleaseReport> {
        let err = match self.release_reservation(reservation).await {
            Ok(report) => return Ok(report),
            Err(e) => e,
        };
        if !err.is_transient() {
            error!(
                reservation_id = %reservation.id,
                error = %err,
                "Capacity not released, reservation left {}", reservation.status
            );
            return Err(err);
        }

        match self
            .repos
            .reservations()
            .transition(reservation.id, reservation.status, previous)
            .await
        {
            Ok(true) => warn!(
                reservation_id = %reservation.id,
                error = %err,
                "Release failed, reservation back to {}", previous
            ),
            Ok(false) => error!(
                reservation_id = %reservation.id,
                "Release failed and reservation changed meanwhile, capacity still held"
            ),
            Err(revert) => error!(
                reservation_id = %reservation.id,
                error = %revert,
                "Release failed and reservation could not be reverted, capacity still held"
            ),
        }
        Err(err)
    }

    async fn mutate<T, F>(
        &self,
        planning_id: PlanningId,
        operation: &str,
        f: F,
    ) -> DomainResult<(Planning, T)>
    where
        F: Fn(&mut Planning) -> DomainResult<T> + Send + Sync,
        T: Send,
    {
        let this = self;
        let f = &f;
        retry_with_backoff(
            &self.retry,
            move || this.try_mutate(planning_id, f),
            DomainError::is_transient,
            operation,
        )
        .await
    }

    async fn try_mutate<T, F>(&self, planning_id: PlanningId, f: &F) -> DomainResult<(Planning, T)>
    where
        F: Fn(&mut Planning) -> DomainResult<T> + Send + Sync,
        T: Send,
    {
        let mut planning = self.get(planning_id).await?;
        let value = f(&mut planning)?;
        planning.version = self.repos.plannings().update(planning.clone()).await?;
        Ok((planning, value))
    }
}
