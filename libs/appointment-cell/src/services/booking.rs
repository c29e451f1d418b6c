// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::events::{AppointmentEvent, AppointmentEventKind, EventPublisher};
use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, Guardian,
    MedicalService, Pet, Resource,
};
use crate::services::calendar::ClinicCalendar;
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionTrigger};
use crate::services::pricing::PricingService;
use crate::store::{AppointmentStore, CatalogStore, StatusChange};

/// Write path: validates, prices, and atomically books appointments, then
/// drives their status changes.
pub struct AppointmentBookingService {
    catalog: Arc<dyn CatalogStore>,
    store: Arc<dyn AppointmentStore>,
    calendar: ClinicCalendar,
    pricing: PricingService,
    lifecycle: AppointmentLifecycleService,
    events: Arc<dyn EventPublisher>,
}

impl AppointmentBookingService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        store: Arc<dyn AppointmentStore>,
        calendar: ClinicCalendar,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog,
            store,
            calendar,
            pricing: PricingService::new(),
            lifecycle: AppointmentLifecycleService::new(),
            events,
        }
    }

    /// Book `request` in `PendingPayment`.
    ///
    /// Nothing is persisted unless every check passes. The overlap re-check
    /// runs inside the store's insert, so a slot that looked free on the read
    /// path can still come back as `SchedulingConflict`.
    #[instrument(skip(self, request), fields(service_id = %request.service_id, start = %request.start_time))]
    pub async fn create_booking(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment for guardian {} and pet {}", request.guardian_id, request.pet_id);

        let service = self.load_service(request.service_id).await?;
        let guardian = self.load_guardian(request.guardian_id).await?;
        let pet = self.load_pet(request.pet_id).await?;

        if pet.guardian_id != guardian.id {
            warn!("Pet {} does not belong to guardian {}", pet.id, guardian.id);
            return Err(AppointmentError::InvalidRequest(format!(
                "pet {} does not belong to guardian {}",
                pet.id, guardian.id
            )));
        }

        let start = request.start_time;
        let end = start.checked_add_signed(service.duration()?).ok_or_else(|| {
            AppointmentError::InvalidRequest(format!("appointment starting at {} ends out of range", start))
        })?;
        if !self.calendar.interval_within_hours(start, end) {
            debug!("Rejected {} - {}: outside clinic hours", start, end);
            return Err(AppointmentError::OutsideClinicHours { start, end });
        }

        let weight = request.pet_weight.or(pet.current_weight);
        let final_price = self.pricing.calculate_price(&service, weight)?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            status: AppointmentStatus::PendingPayment,
            final_price,
            service_id: service.id,
            pet_id: pet.id,
            guardian_id: guardian.id,
            origin: request.origin,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        let booked = self.store.insert_if_slot_free(appointment).await.map_err(|e| {
            warn!("Booking {} - {} failed: {}", start, end, e);
            AppointmentError::from(e)
        })?;

        self.events
            .publish(AppointmentEvent::for_appointment(AppointmentEventKind::Created, &booked));

        info!(
            "Appointment {} booked for {} at {} ({} minor units)",
            booked.id, guardian.full_name, booked.start_time, booked.final_price
        );
        Ok(booked)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::not_found(Resource::Appointment, appointment_id))
    }

    /// Payment collaborator reported success.
    pub async fn confirm_booking(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, AppointmentStatus::Confirmed, TransitionTrigger::Payment, None)
            .await
    }

    /// Blank reasons are stored as none.
    pub async fn cancel_booking(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let reason = reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        self.transition(
            appointment_id,
            AppointmentStatus::Cancelled,
            TransitionTrigger::Cancellation,
            reason,
        )
        .await
    }

    /// Clinical-record collaborator filed the consultation.
    pub async fn complete_booking(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(
            appointment_id,
            AppointmentStatus::Completed,
            TransitionTrigger::ClinicalRecord,
            None,
        )
        .await
    }

    #[instrument(skip(self, reason))]
    async fn transition(
        &self,
        appointment_id: Uuid,
        to: AppointmentStatus,
        trigger: TransitionTrigger,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id).await?;
        let event_kind = self.lifecycle.validate_status_transition(current.status, to, trigger)?;

        let updated = self
            .store
            .transition_status(StatusChange {
                appointment_id,
                from: current.status,
                to,
                cancellation_reason: reason,
                at: Utc::now(),
            })
            .await?;

        self.events.publish(AppointmentEvent::for_appointment(event_kind, &updated));

        info!("Appointment {} moved from {} to {}", appointment_id, current.status, updated.status);
        Ok(updated)
    }

    async fn load_service(&self, id: Uuid) -> Result<MedicalService, AppointmentError> {
        self.catalog
            .get_service(id)
            .await?
            .ok_or(AppointmentError::not_found(Resource::Service, id))
    }

    async fn load_pet(&self, id: Uuid) -> Result<Pet, AppointmentError> {
        self.catalog
            .get_pet(id)
            .await?
            .ok_or(AppointmentError::not_found(Resource::Pet, id))
    }

    async fn load_guardian(&self, id: Uuid) -> Result<Guardian, AppointmentError> {
        self.catalog
            .get_guardian(id)
            .await?
            .ok_or(AppointmentError::not_found(Resource::Guardian, id))
    }
}
