//! Booking timeline: an append-only audit trail of the steps a booking went through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::StepOutcome;

pub const BOOKING_CREATED: &str = "booking_created";
pub const BOOKING_APPROVED: &str = "booking_approved";
pub const BOOKING_DECLINED: &str = "booking_declined";
pub const SLOT_RESERVED: &str = "slot_reserved";
pub const RESERVATION_CREATED: &str = "reservation_created";
pub const RESERVATION_RESTARTED: &str = "reservation_restarted";
pub const RESERVATION_CONFIRMED: &str = "reservation_confirmed";
pub const RESERVATION_CANCELLED: &str = "reservation_cancelled";
pub const HOLD_EXPIRED: &str = "hold_expired";
pub const PAYMENT_CHARGED: &str = "payment_charged";
pub const PAYMENT_COMPLETED: &str = "payment_completed";
pub const PAYMENT_SKIPPED: &str = "payment_skipped";
pub const PAYMENT_FAILED: &str = "payment_failed";
pub const PAYMENT_REFUNDED: &str = "payment_refunded";
pub const REFUND_FAILED: &str = "refund_failed";
pub const CONFLICT_DETECTED: &str = "conflict_detected";
pub const BOOKING_CONFIRMED: &str = "booking_confirmed";
pub const BOOKING_CANCELLED: &str = "booking_cancelled";
pub const BOOKING_COMPLETED: &str = "booking_completed";
pub const BOOKING_FAILED: &str = "booking_failed";

/// A single entry in a booking's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub step: String,
    pub status: StepOutcome,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TimelineStep {
    /// A completed step.
    pub fn completed(step: &str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(step, StepOutcome::Completed, Some(message.into()), at)
    }

    /// A failed step.
    pub fn failed(step: &str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(step, StepOutcome::Failed, Some(message.into()), at)
    }

    /// A skipped step.
    pub fn skipped(step: &str, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(step, StepOutcome::Skipped, Some(message.into()), at)
    }

    pub fn new(
        step: &str,
        status: StepOutcome,
        message: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            step: step.to_string(),
            status,
            timestamp,
            message,
        }
    }
}
