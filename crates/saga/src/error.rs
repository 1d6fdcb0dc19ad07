//! Saga error types.

use booking_store::BookingStoreError;
use common::BookingId;
use domain::{ConflictingBooking, TransitionError, ValidationError};
use thiserror::Error;

use crate::services::PaymentErrorCode;

/// Errors from the reservation hold client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HoldError {
    /// The downstream reports no capacity.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("Hold {hold_id} has expired")]
    Expired { hold_id: String },

    /// Unknown or previously cancelled hold.
    #[error("Hold {hold_id} not found")]
    NotFound { hold_id: String },

    /// Network failure or timeout.
    #[error("Reservation service unavailable: {0}")]
    Unavailable(String),

    #[error("Reservation service rejected the request: {0}")]
    Rejected(String),
}

/// Errors from the payment client. Declines are not errors; see
/// [`crate::services::ChargeOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentClientError {
    #[error("Payment service unavailable: {0}")]
    Unavailable(String),

    #[error("Payment rejected: {code}")]
    Rejected { code: PaymentErrorCode },

    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Unexpected payment service response: {0}")]
    InvalidResponse(String),
}

/// Errors from the provider-metrics client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderMetricsError {
    #[error("Provider service unavailable: {0}")]
    Unavailable(String),

    #[error("Provider service rejected the request: {0}")]
    Rejected(String),
}

/// Errors surfaced by booking orchestrator operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Malformed input. Nothing was persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The dates overlap another active booking of the same provider.
    #[error("Dates {} overlap booking {}", .conflicting.date_range, .conflicting.confirmation_number)]
    Conflict { conflicting: Box<ConflictingBooking> },

    /// The reservation service has nothing left to hold.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A collaborator could not be reached or timed out.
    #[error("{service} service unavailable: {reason}")]
    UpstreamUnavailable {
        service: &'static str,
        reason: String,
    },

    /// A collaborator answered with an error we cannot act on.
    #[error("{service} service error: {reason}")]
    UpstreamRejected {
        service: &'static str,
        reason: String,
    },

    #[error("Payment declined: {code}")]
    PaymentDeclined { code: PaymentErrorCode },

    /// The hold lapsed and could not be re-acquired.
    #[error("Hold {hold_id} has expired")]
    HoldExpired { hold_id: String },

    /// The hold was cancelled before it could be confirmed.
    #[error("Hold {hold_id} not found")]
    HoldNotFound { hold_id: String },

    /// Another request changed the booking first; re-fetch and retry.
    #[error("Booking {booking_id} changed concurrently: {reason}")]
    StateConflict { booking_id: BookingId, reason: String },

    /// The booking's state does not permit the operation.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Reconciliation was asked for a booking that was never charged.
    #[error("Booking {0} has no payment transaction")]
    NoTransaction(BookingId),

    #[error("Booking store error: {0}")]
    Store(BookingStoreError),
}

impl From<BookingStoreError> for BookingError {
    fn from(err: BookingStoreError) -> Self {
        match err {
            BookingStoreError::NotFound(id) => BookingError::NotFound(format!("booking {id}")),
            BookingStoreError::SlotTaken { conflicting, .. } => BookingError::Conflict {
                conflicting: Box::new(conflicting),
            },
            BookingStoreError::StatusConflict { booking_id, .. }
            | BookingStoreError::VersionConflict { booking_id, .. }
            | BookingStoreError::TimelineClosed(booking_id) => BookingError::StateConflict {
                booking_id,
                reason: err.to_string(),
            },
            other => BookingError::Store(other),
        }
    }
}

impl From<HoldError> for BookingError {
    fn from(err: HoldError) -> Self {
        match err {
            HoldError::ResourceUnavailable(detail) => BookingError::ResourceUnavailable(detail),
            HoldError::Expired { hold_id } => BookingError::HoldExpired { hold_id },
            HoldError::NotFound { hold_id } => BookingError::HoldNotFound { hold_id },
            HoldError::Unavailable(reason) => BookingError::UpstreamUnavailable {
                service: "reservation",
                reason,
            },
            HoldError::Rejected(reason) => BookingError::UpstreamRejected {
                service: "reservation",
                reason,
            },
        }
    }
}

impl From<PaymentClientError> for BookingError {
    fn from(err: PaymentClientError) -> Self {
        match err {
            PaymentClientError::Unavailable(reason) => BookingError::UpstreamUnavailable {
                service: "payment",
                reason,
            },
            PaymentClientError::Rejected { code } => BookingError::PaymentDeclined { code },
            PaymentClientError::NotFound(tx) => BookingError::NotFound(format!("transaction {tx}")),
            PaymentClientError::InvalidResponse(reason) => BookingError::UpstreamRejected {
                service: "payment",
                reason,
            },
        }
    }
}

impl BookingError {
    /// Stable machine-readable code for API clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::Conflict { .. } => "BOOKING_CONFLICT",
            BookingError::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            BookingError::UpstreamUnavailable { .. } => "SERVICE_UNAVAILABLE",
            BookingError::UpstreamRejected { .. } => "UPSTREAM_ERROR",
            BookingError::PaymentDeclined { code } => code.as_str(),
            BookingError::HoldExpired { .. } => "HOLD_EXPIRED",
            BookingError::HoldNotFound { .. } => "HOLD_NOT_FOUND",
            BookingError::StateConflict { .. } => "STATE_CONFLICT",
            BookingError::Transition(err) => match err {
                TransitionError::InvalidTransition { .. } => "INVALID_TRANSITION",
                TransitionError::HoldExpired { .. } => "HOLD_EXPIRED",
                TransitionError::HoldNotConfirmed { .. } => "HOLD_NOT_CONFIRMED",
                TransitionError::CancellationNotAllowed(_) => "CANCELLATION_NOT_ALLOWED",
                TransitionError::NotYetEnded { .. } => "BOOKING_NOT_ENDED",
            },
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::NoTransaction(_) => "NO_TRANSACTION",
            BookingError::Store(_) => "INTERNAL_ERROR",
        }
    }

    /// Customer-facing message. Never carries raw upstream text.
    pub fn user_message(&self) -> String {
        let fixed = match self {
            BookingError::Validation(err) => return err.to_string(),
            BookingError::Transition(TransitionError::CancellationNotAllowed(decision)) => {
                return match &decision.reason {
                    Some(reason) => reason.to_string(),
                    None => "This booking cannot be cancelled.".to_string(),
                };
            }
            BookingError::Transition(TransitionError::InvalidTransition { status, .. }) => {
                return format!("This action is not available while the booking is {status}.");
            }
            BookingError::Conflict { .. } => {
                "The selected dates are no longer available. Please choose different dates."
            }
            BookingError::ResourceUnavailable(_) => {
                "The selected service is fully booked for these dates."
            }
            BookingError::UpstreamUnavailable { .. } => {
                "A booking partner is temporarily unavailable. Please try again later."
            }
            BookingError::UpstreamRejected { .. } => {
                "A booking partner could not process the request. Please try again later."
            }
            BookingError::PaymentDeclined { code } => code.user_message(),
            BookingError::HoldExpired { .. }
            | BookingError::Transition(TransitionError::HoldExpired { .. }) => {
                "Your reservation hold expired before the booking was completed. Please try again."
            }
            BookingError::HoldNotFound { .. }
            | BookingError::Transition(TransitionError::HoldNotConfirmed { .. }) => {
                "Your reservation could not be confirmed. Please try again."
            }
            BookingError::StateConflict { .. } => {
                "The booking was updated by another request. Please refresh and try again."
            }
            BookingError::Transition(TransitionError::NotYetEnded { .. }) => {
                "The booking cannot be completed before its end date."
            }
            BookingError::NotFound(_) => "The requested booking could not be found.",
            BookingError::NoTransaction(_) => "No payment has been recorded for this booking.",
            BookingError::Store(_) => "Something went wrong. Please try again later.",
        };
        fixed.to_string()
    }
}

/// Convenience type alias for orchestrator results.
pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflicts_become_state_conflicts() {
        let booking_id = BookingId::new();
        let err: BookingError = BookingStoreError::StatusConflict {
            booking_id,
            expected: domain::BookingStatus::Pending,
            actual: domain::BookingStatus::Approved,
        }
        .into();
        assert_eq!(err.error_code(), "STATE_CONFLICT");

        let err: BookingError = BookingStoreError::NotFound(booking_id).into();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_upstream_text_never_reaches_the_user() {
        let err: BookingError = HoldError::Unavailable("ECONNREFUSED 10.0.0.7:3001".into()).into();
        assert_eq!(err.error_code(), "SERVICE_UNAVAILABLE");
        assert!(!err.user_message().contains("ECONNREFUSED"));

        let err: BookingError = PaymentClientError::Rejected {
            code: PaymentErrorCode::InvalidCvv,
        }
        .into();
        assert_eq!(err.error_code(), "INVALID_CVV");
        assert_eq!(
            err.user_message(),
            "Invalid security code (CVV). Please check and try again."
        );
    }
}
