//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::TransitionError;
use saga::BookingError;
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
///
/// Every error renders the `{success, message, error, errorCode}` envelope.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed path parameter or request body.
    BadRequest(String),
    /// Orchestrator failure.
    Booking(BookingError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Booking(err) => booking_status(err),
        }
    }
}

fn booking_status(err: &BookingError) -> StatusCode {
    match err {
        BookingError::Validation(_) => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) | BookingError::NoTransaction(_) => StatusCode::NOT_FOUND,
        BookingError::Conflict { .. }
        | BookingError::ResourceUnavailable(_)
        | BookingError::StateConflict { .. }
        | BookingError::HoldExpired { .. }
        | BookingError::HoldNotFound { .. } => StatusCode::CONFLICT,
        BookingError::Transition(TransitionError::CancellationNotAllowed(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BookingError::Transition(_) => StatusCode::CONFLICT,
        BookingError::PaymentDeclined { .. } => StatusCode::PAYMENT_REQUIRED,
        BookingError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        BookingError::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
        BookingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, code) = match &self {
            ApiError::BadRequest(msg) => (msg.clone(), "BAD_REQUEST"),
            ApiError::Booking(err) => (err.user_message(), err.error_code()),
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, %status, "request failed");
        } else {
            tracing::debug!(error = ?self, %status, "request rejected");
        }
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let mut body = json!({
            "success": false,
            "message": message,
            "error": status.canonical_reason().unwrap_or("Error"),
            "errorCode": code,
        });
        if let ApiError::Booking(err) = &self {
            extend_with_details(&mut body, err);
        }
        (status, Json(body)).into_response()
    }
}

/// Adds the fields a client needs to act on a conflict or a denied cancellation.
fn extend_with_details(body: &mut Value, err: &BookingError) {
    match err {
        BookingError::Conflict { conflicting } => {
            body["data"] = json!({ "conflictingBooking": conflicting });
        }
        BookingError::Transition(TransitionError::CancellationNotAllowed(decision)) => {
            body["allowed"] = json!(decision.allowed);
            body["daysUntilStart"] = json!(decision.days_until_start);
            body["requiredDays"] = json!(decision.required_days);
        }
        _ => {}
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        ApiError::Booking(err)
    }
}
