// PostgREST-backed stores. The atomic booking path relies on the
// `book_appointment` function and the `appointments_no_overlap` exclusion
// constraint from libs/shared/database/migrations.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDateTime, SecondsFormat};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{ApiError, SupabaseClient};

use crate::models::{Appointment, AppointmentStatus, Guardian, MedicalService, Pet};

use super::{AppointmentStore, CatalogStore, StatusChange, StoreError};

const APPOINTMENTS: &str = "/rest/v1/appointments";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn backend(err: anyhow::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn ts(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

async fn fetch_one<T: DeserializeOwned>(
    supabase: &SupabaseClient,
    path: String,
) -> Result<Option<T>, StoreError> {
    let rows: Vec<T> = supabase
        .request(Method::GET, &path, None, None)
        .await
        .map_err(backend)?;
    Ok(rows.into_iter().next())
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn list(&self, query: String) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", APPOINTMENTS, query);
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(backend)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_active_in_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(format!(
            "status=neq.{}&start_time=lt.{}&end_time=gt.{}&order=start_time.asc",
            AppointmentStatus::Cancelled,
            ts(to),
            ts(from)
        ))
        .await
    }

    async fn insert_if_slot_free(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let (start, end) = (appointment.start_time, appointment.end_time);

        let rows: Vec<Appointment> = self
            .supabase
            .rpc("book_appointment", json!({ "appointment": appointment }))
            .await
            .map_err(|err| match err.downcast_ref::<ApiError>() {
                Some(api) if api.is_conflict() => {
                    debug!("book_appointment rejected {} - {}: {}", start, end, api.body);
                    StoreError::SlotTaken { start, end }
                }
                _ => backend(err),
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("book_appointment returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        fetch_one(&self.supabase, format!("{}?id=eq.{}", APPOINTMENTS, id)).await
    }

    async fn transition_status(&self, change: StatusChange) -> Result<Appointment, StoreError> {
        let mut update = Map::new();
        update.insert("status".to_string(), json!(change.to));
        update.insert(
            "updated_at".to_string(),
            json!(change.at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        if change.to == AppointmentStatus::Cancelled {
            update.insert("cancellation_reason".to_string(), json!(change.cancellation_reason));
        }

        // The status filter makes the PATCH a compare-and-set.
        let path = format!(
            "{}?id=eq.{}&status=eq.{}",
            APPOINTMENTS, change.appointment_id, change.from
        );
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(Value::Object(update)),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(backend)?;

        if let Some(updated) = rows.into_iter().next() {
            return Ok(updated);
        }

        match self.get(change.appointment_id).await? {
            None => Err(StoreError::AppointmentNotFound(change.appointment_id)),
            Some(current) => {
                warn!(
                    "Status of appointment {} changed concurrently: expected {}, found {}",
                    change.appointment_id, change.from, current.status
                );
                Err(StoreError::StatusChanged {
                    id: change.appointment_id,
                    expected: change.from,
                    actual: Some(current.status),
                    attempted: change.to,
                })
            }
        }
    }

    async fn find_confirmed_ended_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.list(format!(
            "status=eq.{}&end_time=lt.{}&order=end_time.asc",
            AppointmentStatus::Confirmed,
            ts(cutoff)
        ))
        .await
    }
}

pub struct SupabaseCatalogStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseCatalogStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl CatalogStore for SupabaseCatalogStore {
    async fn get_service(&self, id: Uuid) -> Result<Option<MedicalService>, StoreError> {
        fetch_one(&self.supabase, format!("/rest/v1/medical_services?id=eq.{}", id)).await
    }

    async fn get_pet(&self, id: Uuid) -> Result<Option<Pet>, StoreError> {
        fetch_one(&self.supabase, format!("/rest/v1/pets?id=eq.{}", id)).await
    }

    async fn get_guardian(&self, id: Uuid) -> Result<Option<Guardian>, StoreError> {
        fetch_one(&self.supabase, format!("/rest/v1/guardians?id=eq.{}", id)).await
    }
}
