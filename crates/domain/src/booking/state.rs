//! Booking state machine and the sub-statuses tracked alongside it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The state of a booking in its lifecycle.
///
/// State transitions:
/// ```text
///            ┌──► Approved ──┐
/// Pending ───┼───────────────┴──► Reserved ──► Confirmed ──► Completed
///   │  │     │                      │   │          │
///   │  └─► Declined                 │   └─► PaymentFailed
///   │                               └─► Failed     │
///   └──────────────┴───────────────────────────────┴──► Cancelled
/// ```
///
/// `Cancelled`, `Declined`, `Completed` and `Failed` are terminal.
/// `PaymentFailed` may still be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, awaiting provider approval or payment.
    #[default]
    Pending,

    /// Approved by the provider (guide bookings), awaiting payment.
    Approved,

    /// Holds the date range while payment is in flight.
    Reserved,

    /// Paid and reserved.
    Confirmed,

    /// Payment was declined or errored; nothing is held.
    PaymentFailed,

    /// Cancelled by the customer or an operator (terminal).
    Cancelled,

    /// Declined by the provider (terminal).
    Declined,

    /// The booked period has ended (terminal).
    Completed,

    /// The booking saga failed and was compensated (terminal).
    Failed,
}

impl BookingStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [BookingStatus; 9] = [
        BookingStatus::Pending,
        BookingStatus::Approved,
        BookingStatus::Reserved,
        BookingStatus::Confirmed,
        BookingStatus::PaymentFailed,
        BookingStatus::Cancelled,
        BookingStatus::Declined,
        BookingStatus::Completed,
        BookingStatus::Failed,
    ];

    /// Returns true if the provider can approve the booking in this state.
    pub fn can_approve(&self) -> bool {
        matches!(self, BookingStatus::Pending)
    }

    /// Returns true if the provider can decline the booking in this state.
    pub fn can_decline(&self) -> bool {
        matches!(self, BookingStatus::Pending)
    }

    /// Returns true if payment may be initiated in this state.
    pub fn can_pay(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Approved)
    }

    /// Returns true if the booking can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the booking can be marked completed in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled
                | BookingStatus::Declined
                | BookingStatus::Completed
                | BookingStatus::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Reserved => "reserved",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::PaymentFailed => "payment_failed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Declined => "declined",
            BookingStatus::Completed => "completed",
            BookingStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown booking status '{s}'"))
    }
}

/// Status of the temporary hold on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl HoldStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldStatus::Pending => "pending",
            HoldStatus::Confirmed => "confirmed",
            HoldStatus::Cancelled => "cancelled",
            HoldStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the money movement for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome recorded against a timeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    Failed,
    Skipped,
}
