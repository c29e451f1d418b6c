use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, ClinicCatalog, Guardian, MedicalService, Pet};
use crate::services::conflict::{find_conflicts, intervals_overlap};

use super::{AppointmentStore, CatalogStore, StatusChange, StoreError};

/// Process-local store. The appointment map's write guard is held across the
/// overlap re-check and the insert, which serializes competing bookings.
#[derive(Default)]
pub struct InMemoryStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    services: RwLock<HashMap<Uuid, MedicalService>>,
    pets: RwLock<HashMap<Uuid, Pet>>,
    guardians: RwLock<HashMap<Uuid, Guardian>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_service(&self, service: MedicalService) {
        self.services.write().await.insert(service.id, service);
    }

    pub async fn add_pet(&self, pet: Pet) {
        self.pets.write().await.insert(pet.id, pet);
    }

    pub async fn add_guardian(&self, guardian: Guardian) {
        self.guardians.write().await.insert(guardian.id, guardian);
    }

    /// Add every catalog entry; an entry whose id is already known overwrites it.
    pub async fn load_catalog(&self, catalog: ClinicCatalog) {
        info!(
            "Loading catalog: {} service(s), {} guardian(s), {} pet(s)",
            catalog.services.len(),
            catalog.guardians.len(),
            catalog.pets.len()
        );
        for service in catalog.services {
            self.add_service(service).await;
        }
        for guardian in catalog.guardians {
            self.add_guardian(guardian).await;
        }
        for pet in catalog.pets {
            self.add_pet(pet).await;
        }
    }

    /// Load an appointment as-is (fixtures, data import). Skips the overlap check.
    pub async fn seed_appointment(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    pub async fn all_appointments(&self) -> Vec<Appointment> {
        let mut all: Vec<Appointment> = self.appointments.read().await.values().cloned().collect();
        all.sort_by_key(|apt| apt.start_time);
        all
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn find_active_in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|apt| apt.is_active())
            .filter(|apt| intervals_overlap(from, to, apt.start_time, apt.end_time))
            .cloned()
            .collect();
        found.sort_by_key(|apt| apt.start_time);
        Ok(found)
    }

    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;

        let overlapping =
            find_conflicts(appointment.start_time, appointment.end_time, appointments.values()).len();
        if overlapping > 0 {
            debug!(
                "Rejecting {} - {}: overlaps {} active appointment(s)",
                appointment.start_time, appointment.end_time, overlapping
            );
            return Err(StoreError::SlotTaken {
                start: appointment.start_time,
                end: appointment.end_time,
            });
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn transition_status(&self, change: StatusChange) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments
            .get_mut(&change.appointment_id)
            .ok_or(StoreError::AppointmentNotFound(change.appointment_id))?;

        if appointment.status != change.from {
            return Err(StoreError::StatusChanged {
                id: change.appointment_id,
                expected: change.from,
                actual: Some(appointment.status),
                attempted: change.to,
            });
        }

        appointment.status = change.to;
        appointment.updated_at = change.at;
        if change.to == AppointmentStatus::Cancelled {
            appointment.cancellation_reason = change.cancellation_reason;
        }

        Ok(appointment.clone())
    }

    async fn find_confirmed_ended_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|apt| apt.status == AppointmentStatus::Confirmed && apt.end_time < cutoff)
            .cloned()
            .collect();
        found.sort_by_key(|apt| apt.end_time);
        Ok(found)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_service(&self, id: Uuid) -> Result<Option<MedicalService>, StoreError> {
        Ok(self.services.read().await.get(&id).cloned())
    }

    async fn get_pet(&self, id: Uuid) -> Result<Option<Pet>, StoreError> {
        Ok(self.pets.read().await.get(&id).cloned())
    }

    async fn get_guardian(&self, id: Uuid) -> Result<Option<Guardian>, StoreError> {
        Ok(self.guardians.read().await.get(&id).cloned())
    }
}
