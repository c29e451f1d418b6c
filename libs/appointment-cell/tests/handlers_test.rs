mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path, Query, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    Json,
};
use assert_matches::assert_matches;
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::handlers::*;
use appointment_cell::models::*;
use appointment_cell::router::appointment_routes;
use common::{monday, monday_date, Clinic};
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn state_for(clinic: &Clinic) -> AppointmentState {
    AppointmentState {
        config: TestConfig::default().to_arc(),
        booking: Arc::new(clinic.booking()),
        availability: Arc::new(clinic.availability()),
    }
}

fn as_user(id: Uuid, role: &str) -> Extension<User> {
    Extension(TestUser::with_id(id, role).to_user())
}

#[tokio::test]
async fn test_guardian_books_for_self() {
    let clinic = Clinic::new().await;
    let state = state_for(&clinic);

    let (status, Json(body)) = book_appointment(
        State(state),
        as_user(clinic.guardian.id, "guardian"),
        Json(clinic.consult_request(monday(11, 0))),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["status"], "pending_payment");
    assert_eq!(body["appointment"]["final_price"], 10000);
}

#[tokio::test]
async fn test_guardian_cannot_book_for_someone_else() {
    let clinic = Clinic::new().await;

    let result = book_appointment(
        State(state_for(&clinic)),
        as_user(clinic.other_guardian.id, "guardian"),
        Json(clinic.consult_request(monday(11, 0))),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
    assert!(clinic.store.all_appointments().await.is_empty());
}

#[tokio::test]
async fn test_staff_books_for_any_guardian() {
    let clinic = Clinic::new().await;

    let result = book_appointment(
        State(state_for(&clinic)),
        as_user(Uuid::new_v4(), "staff"),
        Json(clinic.consult_request(monday(11, 0))),
    )
    .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_error_kinds_map_to_status_codes() {
    let clinic = Clinic::new().await;
    let state = state_for(&clinic);
    let guardian = clinic.guardian.id;

    book_appointment(State(state.clone()), as_user(guardian, "guardian"), Json(clinic.consult_request(monday(11, 0))))
        .await
        .unwrap();

    let conflict = book_appointment(
        State(state.clone()),
        as_user(guardian, "guardian"),
        Json(clinic.consult_request(monday(11, 15))),
    )
    .await
    .unwrap_err();
    assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

    let outside = book_appointment(
        State(state.clone()),
        as_user(guardian, "guardian"),
        Json(clinic.consult_request(monday(12, 45))),
    )
    .await
    .unwrap_err();
    assert_eq!(outside.status_code(), StatusCode::BAD_REQUEST);

    let unpriced = book_appointment(
        State(state.clone()),
        as_user(guardian, "guardian"),
        Json(clinic.surgery_request(monday(12, 0), Some(25.0))),
    )
    .await
    .unwrap_err();
    assert_eq!(unpriced.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let missing = get_appointment(State(state), as_user(guardian, "admin"), Path(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_confirm_requires_payment_role() {
    let clinic = Clinic::new().await;
    let state = state_for(&clinic);
    let booked = clinic.booking().create_booking(clinic.consult_request(monday(11, 0))).await.unwrap();

    let denied = confirm_appointment(State(state.clone()), as_user(clinic.guardian.id, "guardian"), Path(booked.id)).await;
    assert_matches!(denied, Err(AppError::Forbidden(_)));

    let Json(body) = confirm_appointment(State(state.clone()), as_user(Uuid::new_v4(), "system"), Path(booked.id))
        .await
        .unwrap();
    assert_eq!(body["appointment"]["status"], "confirmed");

    let again = confirm_appointment(State(state), as_user(Uuid::new_v4(), "system"), Path(booked.id))
        .await
        .unwrap_err();
    assert_eq!(again.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_complete_requires_vet() {
    let clinic = Clinic::new().await;
    let state = state_for(&clinic);
    let seeded = clinic.seed(monday(11, 0), 30, AppointmentStatus::Confirmed).await;

    let denied = complete_appointment(State(state.clone()), as_user(Uuid::new_v4(), "staff"), Path(seeded.id)).await;
    assert_matches!(denied, Err(AppError::Forbidden(_)));

    let Json(body) = complete_appointment(State(state), as_user(Uuid::new_v4(), "vet"), Path(seeded.id))
        .await
        .unwrap();
    assert_eq!(body["appointment"]["status"], "completed");
}

#[tokio::test]
async fn test_guardian_cancels_own_appointment_only() {
    let clinic = Clinic::new().await;
    let state = state_for(&clinic);
    let booked = clinic.booking().create_booking(clinic.consult_request(monday(11, 0))).await.unwrap();

    let denied = cancel_appointment(
        State(state.clone()),
        as_user(clinic.other_guardian.id, "guardian"),
        Path(booked.id),
        Some(Json(CancelAppointmentRequest::default())),
    )
    .await;
    assert_matches!(denied, Err(AppError::Forbidden(_)));

    let Json(body) = cancel_appointment(
        State(state),
        as_user(clinic.guardian.id, "guardian"),
        Path(booked.id),
        Some(Json(CancelAppointmentRequest { reason: Some("vet trip postponed".to_string()) })),
    )
    .await
    .unwrap();
    assert_eq!(body["appointment"]["status"], "cancelled");
    assert_eq!(body["appointment"]["cancellation_reason"], "vet trip postponed");
}

#[tokio::test]
async fn test_available_slots_handler() {
    let clinic = Clinic::new().await;

    let Json(body) = get_available_slots(
        State(state_for(&clinic)),
        Query(AvailableSlotsQuery { date: monday_date(), service_id: clinic.consult.id }),
    )
    .await
    .unwrap();

    assert_eq!(body["slots"].as_array().unwrap().len(), 7);
    assert_eq!(body["slots"][0], "2025-03-03T11:00:00");
    assert_eq!(body["duration_minutes"], 30);
}

#[tokio::test]
async fn test_router_requires_bearer_token() {
    let clinic = Clinic::new().await;
    let app = appointment_routes(state_for(&clinic));
    let uri = format!("/slots?date=2025-03-03&service_id={}", clinic.consult.id);

    let anonymous = app
        .clone()
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let user = TestUser::guardian("ana@example.com");
    let token = JwtTestUtils::create_test_token(&user, &TestConfig::default().jwt_secret, None);
    let authorized = app
        .oneshot(
            Request::builder()
                .uri(&uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(authorized.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_router_rejects_expired_token() {
    let clinic = Clinic::new().await;
    let app = appointment_routes(state_for(&clinic));
    let user = TestUser::vet("vet@example.com");
    let token = JwtTestUtils::create_expired_token(&user, &TestConfig::default().jwt_secret);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/{}/complete", Uuid::new_v4()))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cancel_without_body() {
    let clinic = Clinic::new().await;
    let booked = clinic.booking().create_booking(clinic.consult_request(monday(11, 0))).await.unwrap();
    let app = appointment_routes(state_for(&clinic));

    let owner = TestUser::with_id(clinic.guardian.id, "guardian");
    let token = JwtTestUtils::create_test_token(&owner, &TestConfig::default().jwt_secret, None);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/{}/cancel", booked.id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cancelled = clinic.booking().get_appointment(booked.id).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason, None);
}

#[tokio::test]
async fn test_admin_cancels_and_completes_for_clinic() {
    let clinic = Clinic::new().await;
    let state = state_for(&clinic);
    let admin = Extension(TestUser::admin("direccion@example.com").to_user());
    let seeded = clinic.seed(monday(11, 0), 30, AppointmentStatus::Confirmed).await;
    let pending = clinic.booking().create_booking(clinic.consult_request(monday(12, 0))).await.unwrap();

    let Json(body) = complete_appointment(State(state.clone()), admin.clone(), Path(seeded.id))
        .await
        .unwrap();
    assert_eq!(body["appointment"]["status"], "completed");

    let Json(body) = cancel_appointment(State(state), admin, Path(pending.id), None).await.unwrap();
    assert_eq!(body["appointment"]["status"], "cancelled");
}
