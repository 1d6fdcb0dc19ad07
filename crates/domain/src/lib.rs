//! Domain layer for the booking orchestrator.
//!
//! This crate provides the pure booking model:
//! - `Booking` record with embedded reservation, payment and timeline
//! - `BookingStatus` state machine and request validation
//! - Cancellation policy evaluation and the date-range overlap rule
//! - Side-effect free transitions that return the next snapshot plus intents
//!
//! Nothing in this crate performs I/O.

pub mod booking;
pub mod error;

pub use booking::{
    Booking, BookingRequest, BookingStatus, CancellationDecision, CancellationPolicy,
    CancellationWindow, ChargeReceipt, ConfirmationNumber, ConflictingBooking, ContactInfo,
    CounterTarget, Currency, DateRange, DenialReason, HoldGrant, HoldStatus, Intent,
    IntentOutcome, Money, NewBooking, PaymentDetails, PaymentMethod, PaymentStatus, ProviderId,
    ReservationDetails, ServiceType, Settlement, StepOutcome, TimelineStep, Transition,
    TransitionError, active_statuses, find_conflict, policy, timeline, transitions,
};
pub use error::{DomainError, MoneyError, ValidationError};
