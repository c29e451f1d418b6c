use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::{appointment_routes, AppointmentState};
use shared_config::StoreBackend;

pub fn create_router(state: AppointmentState, backend: StoreBackend) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .route(
            "/health",
            get(move || async move {
                Json(json!({
                    "status": "ok",
                    "store": backend.to_string(),
                }))
            }),
        )
        .nest("/appointments", appointment_routes(state))
}
