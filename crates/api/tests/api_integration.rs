//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::Collaborators;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use booking_store::InMemoryBookingStore;
use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryPaymentService, PaymentErrorCode, SagaConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let state = api::create_default_state(InMemoryBookingStore::new());
    api::create_app(state, get_metrics_handle())
}

fn setup_with_payments() -> (Router, Arc<InMemoryPaymentService>) {
    let payments = Arc::new(InMemoryPaymentService::new());
    let collaborators = Collaborators {
        payments: payments.clone(),
        ..Collaborators::in_memory()
    };
    let state = api::create_state(
        InMemoryBookingStore::new(),
        collaborators,
        SagaConfig::default(),
    );
    (api::create_app(state, get_metrics_handle()), payments)
}

/// Accommodation request starting `start_in` from now and lasting two days.
fn booking_body(service_id: &str, start_in: Duration, window: &str) -> Value {
    let start = Utc::now() + start_in;
    json!({
        "userId": "user-7",
        "serviceType": "accommodation",
        "serviceId": service_id,
        "providerId": "provider-7",
        "startDate": start.to_rfc3339(),
        "endDate": (start + Duration::days(2)).to_rfc3339(),
        "totalAmount": "250.00",
        "currency": "USD",
        "cancellationPolicy": {
            "freeCancellation": true,
            "freeCancellationWindow": window,
        },
        "contactInfo": { "email": "guest@example.com", "phone": "+94 77 000 0000" },
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_booking(app: &Router, body: Value) -> Value {
    let (status, json) = send(app, "POST", "/bookings", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "unexpected response: {json}");
    json["data"].clone()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["paymentMode"], "required");
}

#[tokio::test]
async fn test_create_booking_confirms() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(booking_body("villa-1", Duration::days(30), "anytime")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "confirmed");
    assert_eq!(json["data"]["payment"]["status"], "completed");
    assert_eq!(json["data"]["reservation"]["holdStatus"], "confirmed");
    assert!(json["data"]["bookingId"].as_str().is_some());
    assert_eq!(
        json["data"]["confirmationNumber"].as_str().map(str::len),
        Some(8)
    );
}

#[tokio::test]
async fn test_get_booking_by_id_and_confirmation_number() {
    let app = setup();
    let booking = create_booking(&app, booking_body("villa-2", Duration::days(30), "anytime")).await;
    let id = booking["bookingId"].as_str().unwrap();
    let code = booking["confirmationNumber"].as_str().unwrap();

    let (status, json) = send(&app, "GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["confirmationNumber"], code);

    let (status, json) = send(&app, "GET", &format!("/bookings/confirmation/{code}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["bookingId"], id);

    let (status, json) = send(&app, "GET", "/bookings/confirmation/ZZZZ0000", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["errorCode"], "NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_request_returns_validation_error() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(json!({ "serviceType": "accommodation", "totalAmount": 100 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["errorCode"], "VALIDATION_ERROR");
    assert!(json["message"].as_str().unwrap().contains("userId"));
}

#[tokio::test]
async fn test_malformed_json_returns_bad_request() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/bookings")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_amount_returns_bad_request() {
    let app = setup();
    let mut body = booking_body("villa-11", Duration::days(30), "anytime");
    body["totalAmount"] = json!(922_337_203_685_477_580_u64);

    let (status, json) = send(&app, "POST", "/bookings", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().contains("out of range"));
}

#[tokio::test]
async fn test_invalid_booking_id() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/bookings/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errorCode"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_booking_not_found() {
    let app = setup();

    let (status, json) = send(
        &app,
        "GET",
        "/bookings/00000000-0000-4000-8000-000000000000",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Not Found");
}

#[tokio::test]
async fn test_overlapping_booking_conflicts() {
    let app = setup();
    let first = create_booking(&app, booking_body("villa-3", Duration::days(20), "anytime")).await;

    let (status, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(booking_body("villa-3", Duration::days(21), "anytime")),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["errorCode"], "BOOKING_CONFLICT");
    let conflicting = &json["data"]["conflictingBooking"];
    assert_eq!(conflicting["bookingId"], first["bookingId"]);
    assert_eq!(
        conflicting["dateRange"]["startDate"],
        first["dateRange"]["startDate"]
    );
}

#[tokio::test]
async fn test_declined_payment_returns_payment_required() {
    let (app, payments) = setup_with_payments();
    payments.set_decline(Some(PaymentErrorCode::CardDeclined));

    let (status, json) = send(
        &app,
        "POST",
        "/bookings",
        Some(booking_body("villa-4", Duration::days(30), "anytime")),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["success"], false);
    assert_eq!(json["errorCode"], "CARD_DECLINED");
    assert_eq!(payments.payment_count(), 0);
}

#[tokio::test]
async fn test_request_approve_and_pay() {
    let app = setup();

    let (status, json) = send(
        &app,
        "POST",
        "/bookings/requests",
        Some(booking_body("villa-5", Duration::days(30), "anytime")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["status"], "pending");
    let id = json["data"]["bookingId"].as_str().unwrap().to_string();

    let (status, json) = send(&app, "POST", &format!("/bookings/{id}/approve"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "approved");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/bookings/{id}/pay"),
        Some(json!({ "paymentMethod": "wallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "confirmed");
    assert_eq!(json["data"]["payment"]["method"], "wallet");

    let (status, json) = send(&app, "POST", &format!("/bookings/{id}/approve"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["errorCode"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_decline_records_reason() {
    let app = setup();
    let (_, json) = send(
        &app,
        "POST",
        "/bookings/requests",
        Some(booking_body("villa-6", Duration::days(30), "anytime")),
    )
    .await;
    let id = json["data"]["bookingId"].as_str().unwrap().to_string();

    let (status, json) = send(
        &app,
        "POST",
        &format!("/bookings/{id}/decline"),
        Some(json!({ "reason": "Fully booked that week" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "declined");
    assert_eq!(json["data"]["declineReason"], "Fully booked that week");
}

#[tokio::test]
async fn test_cancel_inside_window_is_unprocessable() {
    let app = setup();
    let start_in = Duration::days(3) - Duration::hours(1);
    let booking = create_booking(&app, booking_body("villa-7", start_in, "7_days_before")).await;
    let id = booking["bookingId"].as_str().unwrap();

    let (status, json) = send(&app, "GET", &format!("/bookings/{id}/cancellation"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["allowed"], false);
    assert_eq!(json["data"]["reason"]["code"], "window_closed");

    let (status, json) = send(
        &app,
        "POST",
        &format!("/bookings/{id}/cancel"),
        Some(json!({ "reason": "Change of plans" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["errorCode"], "CANCELLATION_NOT_ALLOWED");
    assert_eq!(json["allowed"], false);
    assert_eq!(json["daysUntilStart"], 3);
    assert_eq!(json["requiredDays"], 7);

    let (_, json) = send(&app, "GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(json["data"]["status"], "confirmed");
}

#[tokio::test]
async fn test_cancel_refunds_confirmed_booking() {
    let app = setup();
    let booking = create_booking(&app, booking_body("villa-8", Duration::days(30), "7_days_before")).await;
    let id = booking["bookingId"].as_str().unwrap();

    let (status, json) = send(&app, "GET", &format!("/bookings/{id}/cancellation"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["allowed"], true);
    assert_eq!(json["data"]["refundAmount"], "250.00");

    let (status, json) = send(&app, "POST", &format!("/bookings/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "cancelled");
    assert_eq!(json["data"]["cancellationReason"], "Cancelled by customer");
    assert_eq!(json["data"]["payment"]["status"], "refunded");

    let (status, json) = send(&app, "POST", &format!("/bookings/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["errorCode"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_complete_before_end_is_rejected() {
    let app = setup();
    let booking = create_booking(&app, booking_body("villa-9", Duration::days(30), "anytime")).await;
    let id = booking["bookingId"].as_str().unwrap();

    let (status, json) = send(&app, "POST", &format!("/bookings/{id}/complete"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["errorCode"], "BOOKING_NOT_ENDED");
}

#[tokio::test]
async fn test_payment_status() {
    let app = setup();
    let booking = create_booking(&app, booking_body("villa-10", Duration::days(30), "anytime")).await;
    let id = booking["bookingId"].as_str().unwrap();

    let (status, json) = send(&app, "GET", &format!("/bookings/{id}/payment-status"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["data"]["transactionId"],
        booking["payment"]["transactionId"]
    );
    assert_eq!(json["data"]["status"], "completed");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    create_booking(&app, booking_body("villa-11", Duration::days(30), "anytime")).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("booking_saga_executions_total"));
}
