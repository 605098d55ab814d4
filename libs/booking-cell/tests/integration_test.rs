use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Days, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use availability_cell::services::store::{AvailabilityService, AVAILABILITY_COLLECTION};
use booking_cell::router::booking_routes;
use shared_database::{AppState, DocumentStore};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_app(state: AppState) -> Router {
    booking_routes(state)
}

fn future_date(days: u64) -> String {
    (Utc::now().date_naive() + Days::new(days)).format("%Y-%m-%d").to_string()
}

async fn seed_availability(state: &AppState, doctor_id: &str, date: &str, times: &[&str]) {
    let mut record = availability_cell::models::AvailabilityRecord::default();
    for time in times {
        record.insert_slot(date.parse().unwrap(), time.parse().unwrap());
    }
    AvailabilityService::new(state.store.clone())
        .replace(doctor_id, &record)
        .await
        .unwrap();
}

async fn seed_doctor_profile(state: &AppState, doctor_id: &str) {
    state
        .store
        .put(
            "doctors",
            doctor_id,
            json!({
                "name": "Dr. Imani Okafor",
                "specialty": "Dermatology",
                "degree": "MD",
                "location": "Market Street Clinic"
            }),
        )
        .await
        .unwrap();
}

fn book_request(token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn full_booking_body(doctor_id: &str, date: &str, time: &str) -> Value {
    json!({
        "doctor_id": doctor_id,
        "date": date,
        "time": time,
        "reason": "Annual checkup",
        "insurance": "Acme Health",
        "patient_type": "new"
    })
}

#[tokio::test]
async fn test_book_appointment_success() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00", "09:30"]).await;
    seed_doctor_profile(&state, &doctor.id).await;

    let response = app
        .clone()
        .oneshot(book_request(&token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("scheduled"));
    assert_eq!(body["doctor_id"], json!(doctor.id));
    assert_eq!(body["patient_id"], json!(patient.id));
    assert_eq!(body["datetime"], json!(format!("{}T09:00:00", day)));
    assert_eq!(body["doctor_info"]["specialty"], json!("Dermatology"));
    assert_eq!(body["patient_info"]["name"], json!("Test Patient"));

    // The consumed slot is gone; the sibling slot survives.
    let doc = state
        .store
        .get(AVAILABILITY_COLLECTION, &doctor.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.body["slots_by_date"][&day], json!(["09:30"]));
}

#[tokio::test]
async fn test_booking_last_slot_deletes_availability_record() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00"]).await;

    let response = app
        .oneshot(book_request(&token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(state
        .store
        .get(AVAILABILITY_COLLECTION, &doctor.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_booking_taken_slot_conflicts() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let first = TestUser::patient("first@example.com");
    let second = TestUser::patient("second@example.com");
    let first_token = JwtTestUtils::create_test_token(&first, &config.jwt_secret, None);
    let second_token = JwtTestUtils::create_test_token(&second, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00"]).await;

    let response = app
        .clone()
        .oneshot(book_request(&first_token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(book_request(&second_token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_booking_with_missing_prerequisites_is_rejected() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00"]).await;

    let response = app
        .oneshot(book_request(
            &token,
            json!({
                "doctor_id": doctor.id,
                "date": day,
                "time": "09:00",
                "reason": "Annual checkup",
                "insurance": "",
                "patient_type": null
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("insurance"));
    assert!(message.contains("patient_type"));
}

#[tokio::test]
async fn test_booking_past_slot_is_rejected() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let past = (Utc::now().date_naive() - Days::new(1)).format("%Y-%m-%d").to_string();
    seed_availability(&state, &doctor.id, &past, &["09:00"]).await;

    let response = app
        .oneshot(book_request(&token, full_booking_body(&doctor.id, &past, "09:00")))
        .await
        .unwrap();

    // Sanitization runs before selection, so the stale slot is unselectable.
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_patient_reads_own_appointments() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00"]).await;

    let response = app
        .clone()
        .oneshot(book_request(&token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();
    let booked = body_json(response).await;

    let request = Request::builder()
        .uri("/me")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["appointments"][0]["id"], booked["id"]);

    // Another patient sees nothing of it.
    let other = TestUser::patient("other@example.com");
    let other_token = JwtTestUtils::create_test_token(&other, &config.jwt_secret, None);
    let request = Request::builder()
        .uri(format!("/{}", booked["id"].as_str().unwrap()))
        .header("Authorization", format!("Bearer {}", other_token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_completes_appointment() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let patient_token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00"]).await;

    let response = app
        .clone()
        .oneshot(book_request(&patient_token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();
    let booked = body_json(response).await;
    let id = booked["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", id))
        .header("Authorization", format!("Bearer {}", doctor_token))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({ "status": "completed" })).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], json!("completed"));

    // Completed is terminal.
    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", id))
        .header("Authorization", format!("Bearer {}", doctor_token))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({ "status": "cancelled" })).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patient_may_only_cancel() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let patient_token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00"]).await;

    let response = app
        .clone()
        .oneshot(book_request(&patient_token, full_booking_body(&doctor.id, &day, "09:00")))
        .await
        .unwrap();
    let booked = body_json(response).await;
    let id = booked["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", id))
        .header("Authorization", format!("Bearer {}", patient_token))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({ "status": "completed" })).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("PATCH")
        .uri(format!("/{}/status", id))
        .header("Authorization", format!("Bearer {}", patient_token))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&json!({ "status": "cancelled" })).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected() {
    let config = TestConfig::default();
    let app = create_test_app(config.to_memory_state());

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/me")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_lists_own_appointments() {
    let config = TestConfig::default();
    let state = config.to_memory_state();
    let app = create_test_app(state.clone());

    let doctor = TestUser::doctor("doctor@example.com");
    let patient = TestUser::patient("patient@example.com");
    let patient_token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let doctor_token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, None);

    let day = future_date(2);
    seed_availability(&state, &doctor.id, &day, &["09:00", "09:30"]).await;

    for time in ["09:30", "09:00"] {
        let response = app
            .clone()
            .oneshot(book_request(&patient_token, full_booking_body(&doctor.id, &day, time)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = Request::builder()
        .uri(format!("/doctor/{}", doctor.id))
        .header("Authorization", format!("Bearer {}", doctor_token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], json!(2));
    // Sorted by datetime, not booking order.
    assert_eq!(body["appointments"][0]["datetime"], json!(format!("{}T09:00:00", day)));

    // Another doctor may not read the list.
    let other = TestUser::doctor("other@example.com");
    let other_token = JwtTestUtils::create_test_token(&other, &config.jwt_secret, None);
    let request = Request::builder()
        .uri(format!("/doctor/{}", doctor.id))
        .header("Authorization", format!("Bearer {}", other_token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
