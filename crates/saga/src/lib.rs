//! Saga orchestration for travel bookings.
//!
//! A booking moves through these steps:
//! 1. Check the provider's calendar for overlapping bookings
//! 2. Place a time-bounded hold with the reservation service
//! 3. Claim the date range on the booking record
//! 4. Charge the customer (skipped in bypass mode)
//! 5. Confirm the hold, re-acquiring it once if it lapsed
//! 6. Mark the booking confirmed, then bump provider counters
//!
//! If a step fails, whatever was taken is given back: the charge is
//! refunded and the hold released. Compensation is best-effort and never
//! masks the original error.

pub mod availability;
pub mod clock;
mod compensation;
pub mod config;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod services;
pub mod steps;

pub use availability::{AvailabilityChecker, StoreAvailabilityChecker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compensation::IntentExecutor;
pub use config::{PaymentMode, SagaConfig, Timeouts};
pub use error::{BookingError, HoldError, PaymentClientError, ProviderMetricsError, Result};
pub use http::{HttpHoldClient, HttpPaymentClient, HttpProviderMetricsClient};
pub use orchestrator::{BookingOrchestrator, SweepReport};
pub use services::{
    ChargeOutcome, ChargeRequest, HoldRequest, InMemoryHoldService, InMemoryPaymentService,
    InMemoryProviderMetrics, PaymentClient, PaymentErrorCode, PaymentStatusReport,
    ProviderMetricsClient, RefundReceipt, ReservationHoldClient,
};
