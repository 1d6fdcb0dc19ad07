//! Booking record, state machine and the rules that gate its transitions.

pub mod availability;
mod model;
pub mod policy;
mod request;
mod state;
pub mod timeline;
pub mod transitions;
mod value_objects;

pub use availability::{ConflictingBooking, active_statuses, find_conflict};
pub use model::{
    Booking, CancellationPolicy, CancellationWindow, PaymentDetails, ReservationDetails,
};
pub use policy::{CancellationDecision, DenialReason};
pub use request::{BookingRequest, NewBooking};
pub use state::{BookingStatus, HoldStatus, PaymentStatus, StepOutcome};
pub use timeline::TimelineStep;
pub use transitions::{
    ChargeReceipt, CounterTarget, HoldGrant, Intent, IntentOutcome, Settlement, Transition,
};
pub use value_objects::{
    ConfirmationNumber, ContactInfo, Currency, DEFAULT_CURRENCY, DateRange, Money, PaymentMethod,
    ProviderId, ServiceType,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised when a transition is not permitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    /// Booking is not in a state that allows the action.
    #[error("Invalid state transition: cannot {action} from {status} state")]
    InvalidTransition {
        status: BookingStatus,
        action: &'static str,
    },

    /// The unconfirmed hold ran out.
    #[error("Hold {hold_id} expired at {expires_at}")]
    HoldExpired {
        hold_id: String,
        expires_at: DateTime<Utc>,
    },

    /// Payment cannot complete while the hold is unconfirmed.
    #[error("Hold {hold_id} must be confirmed before payment can complete")]
    HoldNotConfirmed { hold_id: String },

    /// Cancellation refused by the policy evaluator.
    #[error("Cancellation not allowed: {}", .0.reason.as_ref().map(ToString::to_string).unwrap_or_default())]
    CancellationNotAllowed(Box<CancellationDecision>),

    /// The booked period has not ended yet.
    #[error("Booking cannot be completed before its end date {end_date}")]
    NotYetEnded { end_date: DateTime<Utc> },
}
