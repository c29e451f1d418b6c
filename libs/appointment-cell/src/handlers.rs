// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AvailableSlotsQuery, BookAppointmentRequest,
    CancelAppointmentRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::AppointmentBookingService;

/// Roles allowed to act on behalf of any guardian.
const STAFF_ROLES: &[&str] = &["admin", "staff", "vet"];
/// Payment collaborator authenticates as `system`.
const CONFIRM_ROLES: &[&str] = &["admin", "system"];
/// Clinical-record collaborator authenticates as a vet.
const COMPLETE_ROLES: &[&str] = &["admin", "vet"];

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<AppointmentBookingService>,
    pub availability: Arc<AvailabilityService>,
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidRequest(_) | AppointmentError::OutsideClinicHours { .. } => {
                AppError::BadRequest(err.to_string())
            }
            AppointmentError::NotFound { .. } => AppError::NotFound(err.to_string()),
            AppointmentError::WeightRequired { .. } | AppointmentError::NoPriceForWeight { .. } => {
                AppError::Unprocessable(err.to_string())
            }
            AppointmentError::SchedulingConflict { .. }
            | AppointmentError::InvalidStateTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::Store(msg) => {
                error!("Appointment store failure: {}", msg);
                AppError::Database(msg)
            }
        }
    }
}

fn is_staff(user: &User) -> bool {
    user.has_any_role(STAFF_ROLES)
}

fn acts_for(user: &User, guardian_id: Uuid) -> bool {
    user.id == guardian_id.to_string() || is_staff(user)
}

fn appointment_body(appointment: &Appointment, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "appointment": appointment,
        "message": message
    }))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<AppointmentState>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let response = state.availability.get_available_slots(query.date, query.service_id).await?;
    Ok(Json(json!(response)))
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !acts_for(&user, request.guardian_id) {
        return Err(AppError::Forbidden(
            "Not authorized to book appointments for this guardian".to_string(),
        ));
    }

    let appointment = state.booking.create_booking(request).await?;

    Ok((
        StatusCode::CREATED,
        appointment_body(&appointment, "Appointment reserved, awaiting payment"),
    ))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;

    if !acts_for(&user, appointment.guardian_id) {
        return Err(AppError::Forbidden("Not authorized to view this appointment".to_string()));
    }

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

pub async fn confirm_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(CONFIRM_ROLES) {
        return Err(AppError::Forbidden("Only the payment service can confirm appointments".to_string()));
    }

    let appointment = state.booking.confirm_booking(appointment_id).await?;
    Ok(appointment_body(&appointment, "Appointment confirmed"))
}

pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    body: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let reason = body.map(|Json(request)| request).unwrap_or_default().reason;

    let current = state.booking.get_appointment(appointment_id).await?;

    if !acts_for(&user, current.guardian_id) && !user.has_role("system") {
        return Err(AppError::Forbidden("Not authorized to cancel this appointment".to_string()));
    }

    let appointment = state.booking.cancel_booking(appointment_id, reason).await?;
    Ok(appointment_body(&appointment, "Appointment cancelled"))
}

pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.has_any_role(COMPLETE_ROLES) {
        return Err(AppError::Forbidden("Only veterinarians can complete appointments".to_string()));
    }

    let appointment = state.booking.complete_booking(appointment_id).await?;
    Ok(appointment_body(&appointment, "Appointment completed"))
}
