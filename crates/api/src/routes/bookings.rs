//! Booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use booking_store::BookingStore;
use common::BookingId;
use domain::{Booking, BookingRequest, CancellationDecision, PaymentMethod};
use saga::{
    BookingOrchestrator, PaymentClient, PaymentStatusReport, ProviderMetricsClient,
    ReservationHoldClient,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Orchestrator with collaborators chosen at startup (HTTP or in-memory).
pub type Orchestrator<S> = BookingOrchestrator<
    S,
    Arc<dyn ReservationHoldClient>,
    Arc<dyn PaymentClient>,
    Arc<dyn ProviderMetricsClient>,
>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BookingStore> {
    pub orchestrator: Orchestrator<S>,
}

// -- Request types --

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_method: Option<PaymentMethod>,
}

// -- Response types --

/// Success envelope shared by every booking endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

type Reply<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

fn reply<T>(status: StatusCode, message: impl Into<String>, data: T) -> Reply<T> {
    Ok((
        status,
        Json(Envelope {
            success: true,
            message: message.into(),
            data,
        }),
    ))
}

fn parse_id(id: &str) -> Result<BookingId, ApiError> {
    BookingId::parse(id).map_err(|_| ApiError::BadRequest(format!("Invalid booking id: {id}")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

// -- Handlers --

/// POST /bookings: run the full booking saga.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Reply<Booking> {
    let booking = state.orchestrator.book(body(payload)?).await?;
    reply(StatusCode::CREATED, "Booking confirmed", booking)
}

/// POST /bookings/requests: create a pending booking for provider approval.
#[tracing::instrument(skip(state, payload))]
pub async fn request<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Reply<Booking> {
    let booking = state.orchestrator.request_booking(body(payload)?).await?;
    reply(StatusCode::CREATED, "Booking request created", booking)
}

/// GET /bookings/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Reply<Booking> {
    let booking = state.orchestrator.get(parse_id(&id)?).await?;
    reply(StatusCode::OK, "Booking retrieved", booking)
}

/// GET /bookings/confirmation/{code}
#[tracing::instrument(skip(state))]
pub async fn by_confirmation<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(code): Path<String>,
) -> Reply<Booking> {
    let booking = state.orchestrator.get_by_confirmation_number(&code).await?;
    reply(StatusCode::OK, "Booking retrieved", booking)
}

/// POST /bookings/{id}/approve
#[tracing::instrument(skip(state))]
pub async fn approve<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Reply<Booking> {
    let booking = state.orchestrator.approve(parse_id(&id)?).await?;
    reply(StatusCode::OK, "Booking approved", booking)
}

/// POST /bookings/{id}/decline, body `{reason?}`.
#[tracing::instrument(skip(state, payload))]
pub async fn decline<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Option<Json<ReasonRequest>>,
) -> Reply<Booking> {
    let reason = payload.and_then(|Json(req)| req.reason);
    let booking = state.orchestrator.decline(parse_id(&id)?, reason).await?;
    reply(StatusCode::OK, "Booking declined", booking)
}

/// POST /bookings/{id}/pay, body `{paymentMethod?}`.
#[tracing::instrument(skip(state, payload))]
pub async fn pay<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Option<Json<PayRequest>>,
) -> Reply<Booking> {
    let method = payload.and_then(|Json(req)| req.payment_method);
    let booking = state.orchestrator.pay(parse_id(&id)?, method).await?;
    reply(StatusCode::OK, "Payment completed and booking confirmed", booking)
}

/// POST /bookings/{id}/cancel, body `{reason?}`.
#[tracing::instrument(skip(state, payload))]
pub async fn cancel<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Option<Json<ReasonRequest>>,
) -> Reply<Booking> {
    let reason = payload
        .and_then(|Json(req)| req.reason)
        .unwrap_or_else(|| "Cancelled by customer".to_string());
    let booking = state.orchestrator.cancel(parse_id(&id)?, &reason).await?;
    reply(StatusCode::OK, "Booking cancelled", booking)
}

/// POST /bookings/{id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Reply<Booking> {
    let booking = state.orchestrator.complete(parse_id(&id)?).await?;
    reply(StatusCode::OK, "Booking completed", booking)
}

/// GET /bookings/{id}/cancellation: preview the cancellation policy.
#[tracing::instrument(skip(state))]
pub async fn cancellation<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Reply<CancellationDecision> {
    let decision = state
        .orchestrator
        .evaluate_cancellation(parse_id(&id)?)
        .await?;
    let message = match &decision.reason {
        None => "Booking can be cancelled".to_string(),
        Some(reason) => reason.to_string(),
    };
    reply(StatusCode::OK, message, decision)
}

/// GET /bookings/{id}/payment-status
#[tracing::instrument(skip(state))]
pub async fn payment_status<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Reply<PaymentStatusReport> {
    let report = state.orchestrator.reconcile_payment(parse_id(&id)?).await?;
    reply(StatusCode::OK, "Payment status retrieved", report)
}
