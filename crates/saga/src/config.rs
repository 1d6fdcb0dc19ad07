//! Orchestrator configuration.

use std::str::FromStr;
use std::time::Duration;

use domain::Currency;

/// Whether a booking must be charged before it can be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMode {
    #[default]
    Required,
    /// Confirm without calling the payment service. Recorded as a skipped
    /// payment step on the booking timeline.
    Bypass,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Required => "required",
            PaymentMode::Bypass => "bypass",
        }
    }
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "required" => Ok(PaymentMode::Required),
            "bypass" => Ok(PaymentMode::Bypass),
            other => Err(format!("Unknown payment mode: {other}")),
        }
    }
}

/// Per-call-type limits on remote calls. Payment is allowed longer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub hold: Duration,
    pub payment: Duration,
    pub status: Duration,
    pub provider_metrics: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            hold: Duration::from_secs(10),
            payment: Duration::from_secs(30),
            status: Duration::from_secs(10),
            provider_metrics: Duration::from_secs(10),
        }
    }
}

/// Typed settings for [`crate::BookingOrchestrator`].
#[derive(Debug, Clone, PartialEq)]
pub struct SagaConfig {
    pub payment_mode: PaymentMode,
    pub timeouts: Timeouts,
    /// How many times an expired hold is re-acquired before the saga fails.
    pub max_hold_restarts: u32,
    /// How long a booking without a hold may sit in `reserved` before the
    /// sweep fails it and frees its dates.
    pub claim_timeout: Duration,
    /// Count `approved` guide bookings as occupying their dates.
    pub lock_in_approved_guides: bool,
    pub default_currency: Currency,
    /// Processing fee in basis points, used when the payment service reports none.
    pub processing_fee_bps: u32,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            payment_mode: PaymentMode::Required,
            timeouts: Timeouts::default(),
            max_hold_restarts: 1,
            claim_timeout: Duration::from_secs(15 * 60),
            lock_in_approved_guides: true,
            default_currency: Currency::default(),
            processing_fee_bps: 290,
        }
    }
}
