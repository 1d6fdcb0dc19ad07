//! Remote collaborator contracts and in-memory implementations.

pub mod payment;
pub mod provider;
pub mod reservation;

pub use payment::{
    ChargeOutcome, ChargeRequest, InMemoryPaymentService, PaymentClient, PaymentErrorCode,
    PaymentStatusReport, RefundReceipt,
};
pub use provider::{InMemoryProviderMetrics, ProviderMetricsClient};
pub use reservation::{HoldRequest, InMemoryHoldService, ReservationHoldClient};
