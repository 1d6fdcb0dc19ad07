//! The booking record and its embedded reservation/payment details.

use chrono::{DateTime, Utc};
use common::{BookingId, Version};
use serde::{Deserialize, Serialize};

use super::request::NewBooking;
use super::state::{BookingStatus, HoldStatus, PaymentStatus};
use super::timeline::{self, TimelineStep};
use super::value_objects::{
    ConfirmationNumber, ContactInfo, Currency, DateRange, Money, PaymentMethod, ProviderId,
    ServiceType,
};

/// How long before the start date a booking may still be cancelled for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CancellationWindow {
    #[default]
    #[serde(rename = "anytime")]
    Anytime,
    #[serde(rename = "1_day_before")]
    OneDayBefore,
    #[serde(rename = "7_days_before")]
    SevenDaysBefore,
    #[serde(rename = "14_days_before")]
    FourteenDaysBefore,
}

impl CancellationWindow {
    /// Minimum number of days between now and the start date.
    pub fn required_days(&self) -> i64 {
        match self {
            CancellationWindow::Anytime => 0,
            CancellationWindow::OneDayBefore => 1,
            CancellationWindow::SevenDaysBefore => 7,
            CancellationWindow::FourteenDaysBefore => 14,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationWindow::Anytime => "anytime",
            CancellationWindow::OneDayBefore => "1_day_before",
            CancellationWindow::SevenDaysBefore => "7_days_before",
            CancellationWindow::FourteenDaysBefore => "14_days_before",
        }
    }
}

/// Cancellation policy snapshot, copied from the provider when the booking is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CancellationPolicy {
    pub free_cancellation: bool,
    #[serde(default)]
    pub free_cancellation_window: CancellationWindow,
}

impl CancellationPolicy {
    pub fn free_until(window: CancellationWindow) -> Self {
        Self {
            free_cancellation: true,
            free_cancellation_window: window,
        }
    }
}

/// Temporary hold placed on the provider's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDetails {
    pub hold_id: Option<String>,
    /// Hold replaced by a re-acquisition, kept for audit.
    pub temp_hold_id: Option<String>,
    pub hold_status: HoldStatus,
    pub confirmation_id: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ReservationDetails {
    /// An unconfirmed hold is unusable once `expires_at` has been reached.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.hold_status == HoldStatus::Expired
            || (self.hold_status == HoldStatus::Pending
                && self.expires_at.is_some_and(|expires| now >= expires))
    }

    /// The hold ID, if the hold is still usable at `now`.
    ///
    /// Expired or cancelled holds read as absent.
    pub fn active_hold(&self, now: DateTime<Utc>) -> Option<&str> {
        match self.hold_status {
            HoldStatus::Pending | HoldStatus::Confirmed if !self.is_expired(now) => {
                self.hold_id.as_deref()
            }
            _ => None,
        }
    }

    /// The hold ID regardless of expiry, as long as it was never cancelled.
    ///
    /// Compensation cancels expired holds too; the reservation service treats
    /// that as a no-op.
    pub fn releasable_hold(&self) -> Option<&str> {
        match self.hold_status {
            HoldStatus::Cancelled => None,
            _ => self.hold_id.as_deref(),
        }
    }
}

/// Money movement associated with the booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub transaction_id: Option<String>,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    /// Recorded once at charge time.
    pub processing_fee: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub refund_id: Option<String>,
    pub refund_amount: Money,
    pub refund_date: Option<DateTime<Utc>>,
    pub refund_reason: Option<String>,
}

/// A booking of a third-party travel service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: BookingId,
    pub confirmation_number: ConfirmationNumber,
    pub user_id: String,
    pub service_type: ServiceType,
    pub service_id: String,
    pub service_name: Option<String>,
    pub provider_id: ProviderId,
    pub package_id: Option<String>,
    pub date_range: DateRange,
    pub quantity: u32,
    pub total_amount: Money,
    pub currency: Currency,
    pub status: BookingStatus,
    pub reservation: ReservationDetails,
    pub payment: PaymentDetails,
    pub cancellation_policy: CancellationPolicy,
    pub contact_info: ContactInfo,
    pub timeline: Vec<TimelineStep>,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: Version,
}

impl Booking {
    /// Builds a fresh `pending` booking from a validated request.
    pub fn create(new: NewBooking, now: DateTime<Utc>) -> Self {
        let created = TimelineStep::completed(
            timeline::BOOKING_CREATED,
            format!("Booking created for {} {}", new.service_type, new.service_id),
            now,
        );
        Self {
            booking_id: BookingId::new(),
            confirmation_number: ConfirmationNumber::generate(),
            user_id: new.user_id,
            service_type: new.service_type,
            service_id: new.service_id,
            service_name: new.service_name,
            provider_id: new.provider_id,
            package_id: new.package_id,
            date_range: new.date_range,
            quantity: new.quantity,
            total_amount: new.total_amount,
            currency: new.currency,
            status: BookingStatus::Pending,
            reservation: ReservationDetails::default(),
            payment: PaymentDetails {
                method: new.payment_method,
                ..PaymentDetails::default()
            },
            cancellation_policy: new.cancellation_policy,
            contact_info: new.contact_info,
            timeline: vec![created],
            notes: new.notes,
            cancellation_reason: None,
            cancelled_at: None,
            decline_reason: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        }
    }

    /// Returns true if the booking holds a confirmed payment that could be refunded.
    pub fn is_refundable(&self) -> bool {
        self.payment.status == PaymentStatus::Completed && self.payment.transaction_id.is_some()
    }

    /// The most recent timeline step, if any.
    pub fn last_step(&self) -> Option<&TimelineStep> {
        self.timeline.last()
    }

    /// Returns true if a step with the given name was recorded.
    pub fn has_step(&self, step: &str) -> bool {
        self.timeline.iter().any(|s| s.step == step)
    }
}
