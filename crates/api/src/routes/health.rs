//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use booking_store::BookingStore;
use serde::Serialize;

use super::bookings::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// `required` or `bypass`.
    pub payment_mode: &'static str,
}

/// GET /health: liveness plus the active payment mode.
pub async fn check<S: BookingStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "booking-orchestrator",
        version: env!("CARGO_PKG_VERSION"),
        payment_mode: state.orchestrator.config().payment_mode.as_str(),
    })
}
