// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// A booked interval `[start_time, end_time)` in clinic wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: AppointmentStatus,
    /// Minor currency unit.
    pub final_price: i64,
    pub service_id: Uuid,
    pub pet_id: Uuid,
    pub guardian_id: Uuid,
    pub origin: BookingOrigin,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Active appointments take part in conflict checks.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingPayment,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingPayment => "pending_payment",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel the booking came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingOrigin {
    #[serde(alias = "website")]
    Web,
    #[serde(alias = "app")]
    Mobile,
    #[serde(alias = "whatsapp")]
    WhatsApp,
    Phone,
    #[serde(alias = "front_desk")]
    Reception,
}

impl fmt::Display for BookingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingOrigin::Web => write!(f, "web"),
            BookingOrigin::Mobile => write!(f, "mobile"),
            BookingOrigin::WhatsApp => write!(f, "whats_app"),
            BookingOrigin::Phone => write!(f, "phone"),
            BookingOrigin::Reception => write!(f, "reception"),
        }
    }
}

// ==============================================================================
// CLINIC CATALOG MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalService {
    pub id: Uuid,
    pub name: String,
    pub base_price: i64,
    pub requires_weight: bool,
    pub duration_minutes: i64,
    /// Stored order is significant: the first matching band wins.
    #[serde(default)]
    pub price_rules: Vec<PriceRule>,
}

impl MedicalService {
    /// `InvalidRequest` when `duration_minutes` is out of chrono's range.
    pub fn duration(&self) -> Result<Duration, AppointmentError> {
        Duration::try_minutes(self.duration_minutes).ok_or_else(|| {
            AppointmentError::InvalidRequest(format!(
                "service {} has an unusable duration of {} minutes",
                self.id, self.duration_minutes
            ))
        })
    }
}

/// Closed weight band `[min_weight, max_weight]` in kilograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRule {
    pub min_weight: f64,
    pub max_weight: f64,
    pub price: i64,
}

impl PriceRule {
    pub fn matches(&self, weight: f64) -> bool {
        self.min_weight <= weight && weight <= self.max_weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub guardian_id: Uuid,
    pub name: String,
    pub current_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guardian {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

/// Catalog document loaded into the in-memory store at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicCatalog {
    #[serde(default)]
    pub services: Vec<MedicalService>,
    #[serde(default)]
    pub guardians: Vec<Guardian>,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

impl ClinicCatalog {
    pub fn from_json(raw: &str) -> Result<Self, AppointmentError> {
        let catalog: Self = serde_json::from_str(raw)
            .map_err(|e| AppointmentError::InvalidRequest(format!("malformed clinic catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Every service needs a positive duration and every pet a listed guardian.
    pub fn validate(&self) -> Result<(), AppointmentError> {
        for service in &self.services {
            if service.duration()? <= Duration::zero() {
                return Err(AppointmentError::InvalidRequest(format!(
                    "service {} must last at least one minute",
                    service.id
                )));
            }
        }

        for pet in &self.pets {
            if !self.guardians.iter().any(|g| g.id == pet.guardian_id) {
                return Err(AppointmentError::InvalidRequest(format!(
                    "pet {} references unknown guardian {}",
                    pet.id, pet.guardian_id
                )));
            }
        }

        Ok(())
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub service_id: Uuid,
    pub pet_id: Uuid,
    pub guardian_id: Uuid,
    pub start_time: NaiveDateTime,
    pub origin: BookingOrigin,
    /// Falls back to the pet's recorded weight when absent.
    pub pet_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub service_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsResponse {
    pub date: NaiveDate,
    pub service_id: Uuid,
    pub duration_minutes: i64,
    pub slots: Vec<NaiveDateTime>,
}

/// Outcome of one no-show sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub marked_no_show: usize,
    pub failed: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Service,
    Pet,
    Guardian,
    Appointment,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Service => write!(f, "Service"),
            Resource::Pet => write!(f, "Pet"),
            Resource::Guardian => write!(f, "Guardian"),
            Resource::Appointment => write!(f, "Appointment"),
        }
    }
}

/// Caller-facing classification of an `AppointmentError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    ResourceNotFound,
    PricingUnresolved,
    SchedulingConflict,
    InvalidStateTransition,
    Store,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Requested interval {start} - {end} is outside clinic hours")]
    OutsideClinicHours { start: NaiveDateTime, end: NaiveDateTime },

    #[error("{resource} not found: {id}")]
    NotFound { resource: Resource, id: Uuid },

    #[error("Service {service_id} requires the pet's weight to be priced")]
    WeightRequired { service_id: Uuid },

    #[error("No price defined for service {service_id} at weight {weight} kg")]
    NoPriceForWeight { service_id: Uuid, weight: f64 },

    #[error("Slot {start} - {end} is no longer available")]
    SchedulingConflict { start: NaiveDateTime, end: NaiveDateTime },

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStateTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Store error: {0}")]
    Store(String),
}

impl AppointmentError {
    pub fn not_found(resource: Resource, id: Uuid) -> Self {
        AppointmentError::NotFound { resource, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::InvalidRequest(_) | AppointmentError::OutsideClinicHours { .. } => {
                ErrorKind::InvalidRequest
            }
            AppointmentError::NotFound { .. } => ErrorKind::ResourceNotFound,
            AppointmentError::WeightRequired { .. } | AppointmentError::NoPriceForWeight { .. } => {
                ErrorKind::PricingUnresolved
            }
            AppointmentError::SchedulingConflict { .. } => ErrorKind::SchedulingConflict,
            AppointmentError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            AppointmentError::Store(_) => ErrorKind::Store,
        }
    }

    /// Caller may retry with a different slot or input; store failures are not.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Store
    }
}
