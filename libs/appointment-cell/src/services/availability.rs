// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AvailableSlotsResponse, MedicalService, Resource,
};
use crate::services::calendar::ClinicCalendar;
use crate::services::conflict::is_slot_free;
use crate::store::{AppointmentStore, CatalogStore};

pub const DEFAULT_SLOT_STEP_MINUTES: i64 = 15;

/// Read path for bookable start times. Results may be stale by the time a
/// booking commits; `insert_if_slot_free` re-checks.
pub struct AvailabilityService {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn AppointmentStore>,
    calendar: ClinicCalendar,
    step: Duration,
}

impl AvailabilityService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn AppointmentStore>,
        calendar: ClinicCalendar,
    ) -> Self {
        Self {
            catalog,
            store,
            calendar,
            step: Duration::minutes(DEFAULT_SLOT_STEP_MINUTES),
        }
    }

    /// Non-positive steps fall back to the default.
    pub fn with_step_minutes(mut self, minutes: i64) -> Self {
        if minutes > 0 {
            self.step = Duration::minutes(minutes);
        }
        self
    }

    pub fn calendar(&self) -> &ClinicCalendar {
        &self.calendar
    }

    /// Free start times on `day` for `service_id`, ascending.
    pub async fn slots_for(
        &self,
        day: NaiveDate,
        service_id: Uuid,
    ) -> Result<Vec<NaiveDateTime>, AppointmentError> {
        let service = self.load_service(service_id).await?;
        self.slots_for_service(day, &service).await
    }

    pub async fn get_available_slots(
        &self,
        day: NaiveDate,
        service_id: Uuid,
    ) -> Result<AvailableSlotsResponse, AppointmentError> {
        let service = self.load_service(service_id).await?;
        let slots = self.slots_for_service(day, &service).await?;

        info!("{} free slot(s) on {} for service {}", slots.len(), day, service.name);

        Ok(AvailableSlotsResponse {
            date: day,
            service_id,
            duration_minutes: service.duration_minutes,
            slots,
        })
    }

    async fn load_service(&self, service_id: Uuid) -> Result<MedicalService, AppointmentError> {
        self.catalog
            .get_service(service_id)
            .await?
            .ok_or(AppointmentError::not_found(Resource::Service, service_id))
    }

    async fn slots_for_service(
        &self,
        day: NaiveDate,
        service: &MedicalService,
    ) -> Result<Vec<NaiveDateTime>, AppointmentError> {
        debug!("Calculating slots for service {} on {}", service.id, day);

        let duration = service.duration()?;
        let candidates = self.candidate_slots(day, duration)?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let day_start = day.and_time(NaiveTime::MIN);
        let day_end = day_start
            .checked_add_signed(Duration::days(1))
            .unwrap_or(NaiveDateTime::MAX);
        let existing = self.store.find_active_in_range(day_start, day_end).await?;

        Ok(filter_free(candidates, duration, &existing))
    }

    /// Every `step` from opening while `start + duration <= close`. Empty on closed days.
    pub fn candidate_slots(
        &self,
        day: NaiveDate,
        duration: Duration,
    ) -> Result<Vec<NaiveDateTime>, AppointmentError> {
        if duration <= Duration::zero() {
            return Err(AppointmentError::InvalidRequest(format!(
                "service duration must be positive, got {} minutes",
                duration.num_minutes()
            )));
        }

        let Some(hours) = self.calendar.hours_for(day.weekday()) else {
            debug!("Clinic closed on {} ({})", day, day.weekday());
            return Ok(vec![]);
        };

        let close = day.and_time(hours.close);
        let mut current = day.and_time(hours.open);
        let mut slots = Vec::new();

        while let Some(end) = current.checked_add_signed(duration) {
            if end > close {
                break;
            }
            slots.push(current);
            match current.checked_add_signed(self.step) {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(slots)
    }
}

fn filter_free(
    candidates: Vec<NaiveDateTime>,
    duration: Duration,
    existing: &[Appointment],
) -> Vec<NaiveDateTime> {
    candidates
        .into_iter()
        .filter(|start| {
            start
                .checked_add_signed(duration)
                .is_some_and(|end| is_slot_free(*start, end, existing))
        })
        .collect()
}
