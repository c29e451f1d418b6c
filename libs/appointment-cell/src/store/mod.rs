//! Persistence seams for the scheduling core.
//!
//! Both the request path and the no-show sweeper go through these traits, so
//! every backend must make `insert_if_slot_free` and `transition_status`
//! atomic with respect to each other.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, Guardian, MedicalService, Pet, Resource,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryStore;
pub use supabase::{SupabaseAppointmentStore, SupabaseCatalogStore};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// Another active appointment overlaps the interval.
    #[error("slot {start} - {end} overlaps an active appointment")]
    SlotTaken { start: NaiveDateTime, end: NaiveDateTime },

    /// Compare-and-set lost: the row is no longer in the expected status.
    #[error("appointment {id} is no longer {expected}")]
    StatusChanged {
        id: Uuid,
        expected: AppointmentStatus,
        actual: Option<AppointmentStatus>,
        attempted: AppointmentStatus,
    },

    #[error("appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotTaken { start, end } => AppointmentError::SchedulingConflict { start, end },
            StoreError::AppointmentNotFound(id) => AppointmentError::not_found(Resource::Appointment, id),
            StoreError::StatusChanged { expected, actual, attempted, .. } => {
                AppointmentError::InvalidStateTransition {
                    from: actual.unwrap_or(expected),
                    to: attempted,
                }
            }
            StoreError::Backend(msg) => AppointmentError::Store(msg),
        }
    }
}

/// A status change applied with compare-and-set on `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub appointment_id: Uuid,
    pub from: AppointmentStatus,
    pub to: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Active (non-cancelled) appointments overlapping `[from, to)`, ascending by start.
    async fn find_active_in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Re-check overlap and insert in one atomic step.
    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn transition_status(&self, change: StatusChange) -> Result<Appointment, StoreError>;

    /// `Confirmed` appointments whose `end_time` is strictly before `cutoff`.
    async fn find_confirmed_ended_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError>;
}

/// Read-through lookups for the clinic catalog and identities.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_service(&self, id: Uuid) -> Result<Option<MedicalService>, StoreError>;

    async fn get_pet(&self, id: Uuid) -> Result<Option<Pet>, StoreError>;

    async fn get_guardian(&self, id: Uuid) -> Result<Option<Guardian>, StoreError>;
}
