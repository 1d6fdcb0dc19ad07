//! Pure booking state transitions.
//!
//! Every function takes an immutable snapshot and returns the next snapshot
//! together with the side effects ([`Intent`]s) the caller must carry out.
//! Nothing here performs I/O; persisting the result and executing the intents
//! is the orchestrator's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TransitionError;
use super::availability::ConflictingBooking;
use super::model::Booking;
use super::policy::CancellationDecision;
use super::state::{BookingStatus, HoldStatus, PaymentStatus};
use super::timeline::{self, TimelineStep};
use super::value_objects::{DateRange, Money, PaymentMethod, ProviderId, ServiceType};

/// Resource prefix for tour package counters on the provider-metrics service.
pub const TOUR_PACKAGE_RESOURCE: &str = "tourpackages";

/// A provider-side counter touched when a booking is confirmed or cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTarget {
    pub resource: String,
    pub id: String,
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    CancelHold {
        hold_id: String,
        reason: String,
    },
    Refund {
        transaction_id: String,
        amount: Money,
        reason: String,
    },
    IncrementProviderCounters {
        targets: Vec<CounterTarget>,
    },
    DecrementProviderCounters {
        targets: Vec<CounterTarget>,
    },
    BlockProviderCalendar {
        provider_id: ProviderId,
        range: DateRange,
    },
    UnblockProviderCalendar {
        provider_id: ProviderId,
        range: DateRange,
    },
}

impl Intent {
    /// Short action name used in logs and metrics labels.
    pub fn action(&self) -> &'static str {
        match self {
            Intent::CancelHold { .. } => "cancel_hold",
            Intent::Refund { .. } => "refund",
            Intent::IncrementProviderCounters { .. } => "increment_counters",
            Intent::DecrementProviderCounters { .. } => "decrement_counters",
            Intent::BlockProviderCalendar { .. } => "block_calendar",
            Intent::UnblockProviderCalendar { .. } => "unblock_calendar",
        }
    }
}

/// Result of carrying out one [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentOutcome {
    pub intent: Intent,
    pub succeeded: bool,
    /// Reference handed back by the downstream service (e.g. refund ID).
    pub reference: Option<String>,
    pub detail: Option<String>,
}

impl IntentOutcome {
    pub fn succeeded(intent: Intent, reference: Option<String>) -> Self {
        Self {
            intent,
            succeeded: true,
            reference,
            detail: None,
        }
    }

    pub fn failed(intent: Intent, detail: impl Into<String>) -> Self {
        Self {
            intent,
            succeeded: false,
            reference: None,
            detail: Some(detail.into()),
        }
    }
}

/// The next booking snapshot plus the side effects it requires.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub booking: Booking,
    pub intents: Vec<Intent>,
}

impl Transition {
    fn new(booking: Booking) -> Self {
        Self {
            booking,
            intents: Vec::new(),
        }
    }

    fn with_intents(booking: Booking, intents: Vec<Intent>) -> Self {
        Self { booking, intents }
    }
}

/// A hold granted by the reservation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldGrant {
    pub hold_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeReceipt {
    pub transaction_id: String,
    pub processing_fee: Option<Money>,
    pub method: PaymentMethod,
}

/// How the booking's payment was settled at confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Charged(ChargeReceipt),
    /// Payment skipped by configuration; `reference` stands in for a transaction ID.
    Bypassed { reference: String },
}

fn ensure(
    booking: &Booking,
    allowed: bool,
    action: &'static str,
) -> Result<(), TransitionError> {
    if allowed {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition {
            status: booking.status,
            action,
        })
    }
}

fn advance(booking: &Booking, status: BookingStatus, now: DateTime<Utc>) -> Booking {
    let mut next = booking.clone();
    next.status = status;
    next.updated_at = now;
    next
}

/// Counters incremented at confirmation and decremented on cancellation.
pub fn counter_targets(booking: &Booking) -> Vec<CounterTarget> {
    let mut targets = vec![CounterTarget {
        resource: booking.service_type.resource_name().to_string(),
        id: booking.service_id.clone(),
    }];
    if let Some(package_id) = &booking.package_id {
        targets.push(CounterTarget {
            resource: TOUR_PACKAGE_RESOURCE.to_string(),
            id: package_id.clone(),
        });
    }
    targets
}

/// Transaction ID of money that has been taken and not yet returned.
fn charged_transaction(booking: &Booking) -> Option<&str> {
    match booking.payment.status {
        PaymentStatus::Pending | PaymentStatus::Completed => {
            booking.payment.transaction_id.as_deref()
        }
        _ => None,
    }
}

/// Compensations for a booking that is being abandoned, in reverse order of
/// the forward actions: refund first, then release the hold.
fn rollback_intents(booking: &Booking, refund_amount: Money, reason: &str) -> Vec<Intent> {
    let mut intents = Vec::new();
    if let Some(transaction_id) = charged_transaction(booking)
        && !refund_amount.is_zero()
    {
        intents.push(Intent::Refund {
            transaction_id: transaction_id.to_string(),
            amount: refund_amount,
            reason: reason.to_string(),
        });
    }
    if let Some(hold_id) = booking.reservation.releasable_hold() {
        intents.push(Intent::CancelHold {
            hold_id: hold_id.to_string(),
            reason: reason.to_string(),
        });
    }
    intents
}

/// Provider approves a pending booking.
pub fn approve(booking: &Booking, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    ensure(booking, booking.status.can_approve(), "approve")?;
    let mut next = advance(booking, BookingStatus::Approved, now);
    next.timeline.push(TimelineStep::completed(
        timeline::BOOKING_APPROVED,
        "Booking approved by provider",
        now,
    ));
    Ok(Transition::new(next))
}

/// Provider declines a pending booking.
pub fn decline(
    booking: &Booking,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(booking, booking.status.can_decline(), "decline")?;
    let mut next = advance(booking, BookingStatus::Declined, now);
    next.decline_reason = reason.map(str::to_string);
    next.timeline.push(TimelineStep::completed(
        timeline::BOOKING_DECLINED,
        match reason {
            Some(reason) => format!("Booking declined: {reason}"),
            None => "Booking declined by provider".to_string(),
        },
        now,
    ));
    Ok(Transition::new(next))
}

/// Records a hold granted by the reservation service without changing status.
///
/// A second hold replaces the first; the old ID is kept as `temp_hold_id`.
pub fn record_hold(
    booking: &Booking,
    grant: &HoldGrant,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(
        booking,
        matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::Approved | BookingStatus::Reserved
        ),
        "record hold",
    )?;
    let mut next = advance(booking, booking.status, now);
    let step = match next.reservation.hold_id.take() {
        Some(previous) => {
            next.reservation.temp_hold_id = Some(previous);
            timeline::RESERVATION_RESTARTED
        }
        None => timeline::RESERVATION_CREATED,
    };
    next.reservation.hold_id = Some(grant.hold_id.clone());
    next.reservation.hold_status = HoldStatus::Pending;
    next.reservation.expires_at = Some(grant.expires_at);
    next.reservation.confirmation_id = None;
    next.reservation.confirmed_at = None;
    next.timeline.push(TimelineStep::completed(
        step,
        format!(
            "Hold {} placed until {}",
            grant.hold_id,
            grant.expires_at.to_rfc3339()
        ),
        now,
    ));
    Ok(Transition::new(next))
}

/// Claims the date range: `pending|approved → reserved`.
///
/// Callers must pair the write with an atomic slot guard so that two
/// overlapping bookings can never both be reserved. A booking without a hold
/// takes `claim_expires_at` as its deadline, after which [`expire_hold`]
/// frees the dates.
pub fn claim_slot(
    booking: &Booking,
    claim_expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(booking, booking.status.can_pay(), "reserve")?;
    let mut next = advance(booking, BookingStatus::Reserved, now);
    if next.reservation.hold_id.is_none() {
        next.reservation.hold_status = HoldStatus::Pending;
        next.reservation.expires_at = Some(claim_expires_at);
    }
    next.timeline.push(TimelineStep::completed(
        timeline::SLOT_RESERVED,
        format!("Reserved {}", booking.date_range),
        now,
    ));
    Ok(Transition::new(next))
}

/// Records a successful charge while the booking is reserved.
///
/// Payment stays `pending` until [`confirm`], which is where invariant
/// "completed only with a confirmed hold" is enforced.
pub fn record_charge(
    booking: &Booking,
    receipt: &ChargeReceipt,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(
        booking,
        booking.status == BookingStatus::Reserved,
        "record charge",
    )?;
    let mut next = advance(booking, BookingStatus::Reserved, now);
    next.payment.transaction_id = Some(receipt.transaction_id.clone());
    next.payment.processing_fee = receipt.processing_fee;
    next.payment.method = receipt.method;
    next.payment.error_code = None;
    next.timeline.push(TimelineStep::completed(
        timeline::PAYMENT_CHARGED,
        format!(
            "Charged {} {} (transaction {})",
            booking.total_amount, booking.currency, receipt.transaction_id
        ),
        now,
    ));
    Ok(Transition::new(next))
}

/// Returns the booking's hold ID if it can still be confirmed at `now`.
pub fn usable_hold(booking: &Booking, now: DateTime<Utc>) -> Result<Option<&str>, TransitionError> {
    let reservation = &booking.reservation;
    match (&reservation.hold_id, reservation.expires_at) {
        (Some(hold_id), Some(expires_at)) if reservation.is_expired(now) => {
            Err(TransitionError::HoldExpired {
                hold_id: hold_id.clone(),
                expires_at,
            })
        }
        (Some(_), _) => Ok(reservation.active_hold(now)),
        (None, _) => Ok(None),
    }
}

/// Finalizes a reserved booking: `reserved → confirmed`, payment `completed`.
///
/// `hold_confirmation` is the reservation service's confirmation ID. A
/// booking that carries a hold cannot be confirmed with a real charge unless
/// that hold is confirmed.
pub fn confirm(
    booking: &Booking,
    hold_confirmation: Option<&str>,
    settlement: &Settlement,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(booking, booking.status == BookingStatus::Reserved, "confirm")?;
    let mut next = advance(booking, BookingStatus::Confirmed, now);
    if booking.reservation.hold_id.is_none() {
        next.reservation.expires_at = None;
    }

    if let Some(hold_id) = booking.reservation.hold_id.clone()
        && booking.reservation.hold_status != HoldStatus::Confirmed
    {
        match hold_confirmation {
            Some(confirmation_id) => {
                next.reservation.hold_status = HoldStatus::Confirmed;
                next.reservation.confirmation_id = Some(confirmation_id.to_string());
                next.reservation.confirmed_at = Some(now);
                next.timeline.push(TimelineStep::completed(
                    timeline::RESERVATION_CONFIRMED,
                    format!("Hold {hold_id} confirmed ({confirmation_id})"),
                    now,
                ));
            }
            None if matches!(settlement, Settlement::Charged(_)) => {
                return Err(TransitionError::HoldNotConfirmed { hold_id });
            }
            None => {}
        }
    }

    match settlement {
        Settlement::Charged(receipt) => {
            next.payment.transaction_id = Some(receipt.transaction_id.clone());
            next.payment.processing_fee = receipt.processing_fee;
            next.payment.method = receipt.method;
            next.timeline.push(TimelineStep::completed(
                timeline::PAYMENT_COMPLETED,
                format!("Payment {} completed", receipt.transaction_id),
                now,
            ));
        }
        Settlement::Bypassed { reference } => {
            next.payment.transaction_id = Some(reference.clone());
            next.timeline.push(TimelineStep::skipped(
                timeline::PAYMENT_SKIPPED,
                "Payment processing bypassed by configuration",
                now,
            ));
        }
    }
    next.payment.status = PaymentStatus::Completed;
    next.payment.paid_at = Some(now);
    next.payment.error_code = None;
    next.timeline.push(TimelineStep::completed(
        timeline::BOOKING_CONFIRMED,
        format!("Booking {} confirmed", booking.confirmation_number),
        now,
    ));

    let mut intents = vec![Intent::IncrementProviderCounters {
        targets: counter_targets(booking),
    }];
    if booking.service_type == ServiceType::Guide {
        intents.push(Intent::BlockProviderCalendar {
            provider_id: booking.provider_id.clone(),
            range: booking.date_range,
        });
    }
    Ok(Transition::with_intents(next, intents))
}

/// The charge was declined or errored: `→ payment_failed`, releasing any hold.
pub fn mark_payment_failed(
    booking: &Booking,
    error_code: &str,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(
        booking,
        matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::Approved | BookingStatus::Reserved
        ),
        "mark payment failed",
    )?;
    let mut next = advance(booking, BookingStatus::PaymentFailed, now);
    next.payment.status = PaymentStatus::Failed;
    next.payment.error_code = Some(error_code.to_string());
    next.timeline.push(TimelineStep::failed(
        timeline::PAYMENT_FAILED,
        format!("{error_code}: {message}"),
        now,
    ));
    let intents = rollback_intents(booking, Money::zero(), "payment failed");
    Ok(Transition::with_intents(next, intents))
}

/// Lost the final conflict check: `approved|reserved → pending`.
pub fn revert_to_pending(
    booking: &Booking,
    conflict: &ConflictingBooking,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(
        booking,
        matches!(
            booking.status,
            BookingStatus::Approved | BookingStatus::Reserved | BookingStatus::Pending
        ),
        "revert to pending",
    )?;
    let mut next = advance(booking, BookingStatus::Pending, now);
    next.timeline.push(TimelineStep::failed(
        timeline::CONFLICT_DETECTED,
        format!(
            "Dates {} overlap booking {}",
            conflict.date_range, conflict.confirmation_number
        ),
        now,
    ));
    Ok(Transition::new(next))
}

/// Cancels a non-terminal booking.
///
/// A confirmed booking additionally needs an allowing `decision`; its refund
/// amount is taken from there. Other bookings that were charged get a full
/// refund.
pub fn cancel(
    booking: &Booking,
    reason: &str,
    decision: &CancellationDecision,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(booking, booking.status.can_cancel(), "cancel")?;
    let was_confirmed = booking.status == BookingStatus::Confirmed;
    if was_confirmed && !decision.allowed {
        return Err(TransitionError::CancellationNotAllowed(Box::new(
            decision.clone(),
        )));
    }

    let refund_amount = if was_confirmed {
        decision.refund_amount
    } else {
        booking.total_amount
    };

    let mut next = advance(booking, BookingStatus::Cancelled, now);
    next.cancellation_reason = Some(reason.to_string());
    next.cancelled_at = Some(now);

    let mut intents = Vec::new();
    if was_confirmed {
        if booking.service_type == ServiceType::Guide {
            intents.push(Intent::UnblockProviderCalendar {
                provider_id: booking.provider_id.clone(),
                range: booking.date_range,
            });
        }
        intents.push(Intent::DecrementProviderCounters {
            targets: counter_targets(booking),
        });
    }
    intents.extend(rollback_intents(booking, refund_amount, reason));

    let refund_note = if intents.iter().any(|i| matches!(i, Intent::Refund { .. })) {
        format!(" Refund of {refund_amount} {} issued.", booking.currency)
    } else {
        String::new()
    };
    next.timeline.push(TimelineStep::completed(
        timeline::BOOKING_CANCELLED,
        format!("Booking cancelled: {reason}.{refund_note}"),
        now,
    ));
    Ok(Transition::with_intents(next, intents))
}

/// Folds the outcomes of executed intents back into the booking.
///
/// Status is unchanged. Timeline steps are only added while the booking is
/// not cancelled; a cancelled booking's timeline ends at its cancellation step.
pub fn record_compensation(
    booking: &Booking,
    outcomes: &[IntentOutcome],
    now: DateTime<Utc>,
) -> Transition {
    let mut next = advance(booking, booking.status, now);
    let log_steps = booking.status != BookingStatus::Cancelled;

    for outcome in outcomes {
        let step = match (&outcome.intent, outcome.succeeded) {
            (Intent::CancelHold { hold_id, .. }, true) => {
                if next.reservation.hold_status != HoldStatus::Expired {
                    next.reservation.hold_status = HoldStatus::Cancelled;
                }
                Some(TimelineStep::completed(
                    timeline::RESERVATION_CANCELLED,
                    format!("Hold {hold_id} released"),
                    now,
                ))
            }
            (Intent::CancelHold { hold_id, .. }, false) => Some(TimelineStep::failed(
                timeline::RESERVATION_CANCELLED,
                format!(
                    "Hold {hold_id} could not be released: {}",
                    outcome.detail.as_deref().unwrap_or("unknown error")
                ),
                now,
            )),
            (Intent::Refund { amount, reason, .. }, true) => {
                let refunded = next.payment.refund_amount + *amount;
                next.payment.status = if refunded >= next.total_amount {
                    PaymentStatus::Refunded
                } else {
                    PaymentStatus::PartiallyRefunded
                };
                next.payment.refund_id = outcome.reference.clone();
                next.payment.refund_amount = refunded;
                next.payment.refund_date = Some(now);
                next.payment.refund_reason = Some(reason.clone());
                Some(TimelineStep::completed(
                    timeline::PAYMENT_REFUNDED,
                    format!("Refunded {amount} {}", next.currency),
                    now,
                ))
            }
            (Intent::Refund { transaction_id, .. }, false) => Some(TimelineStep::failed(
                timeline::REFUND_FAILED,
                format!(
                    "Refund for {transaction_id} failed: {}",
                    outcome.detail.as_deref().unwrap_or("unknown error")
                ),
                now,
            )),
            _ => None,
        };
        if let Some(step) = step
            && log_steps
        {
            next.timeline.push(step);
        }
    }
    Transition::new(next)
}

/// Marks a booking completed once its end date has passed.
pub fn complete(booking: &Booking, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    ensure(booking, booking.status.can_complete(), "complete")?;
    if !booking.date_range.has_ended(now) {
        return Err(TransitionError::NotYetEnded {
            end_date: booking.date_range.end_date,
        });
    }
    let mut next = advance(booking, BookingStatus::Completed, now);
    next.completed_at = Some(now);
    next.timeline.push(TimelineStep::completed(
        timeline::BOOKING_COMPLETED,
        "Booking completed",
        now,
    ));
    Ok(Transition::new(next))
}

/// The booking saga failed: `→ failed`, with compensations for anything taken.
pub fn fail(
    booking: &Booking,
    failed_step: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    ensure(booking, !booking.status.is_terminal(), "fail")?;
    let mut next = advance(booking, BookingStatus::Failed, now);
    next.timeline.push(TimelineStep::failed(
        timeline::BOOKING_FAILED,
        format!("{failed_step}: {reason}"),
        now,
    ));
    let intents = rollback_intents(booking, booking.total_amount, reason);
    Ok(Transition::with_intents(next, intents))
}

/// A reserved booking whose unconfirmed hold ran out: `reserved → failed`.
pub fn expire_hold(booking: &Booking, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    ensure(
        booking,
        booking.status == BookingStatus::Reserved && booking.reservation.is_expired(now),
        "expire hold",
    )?;
    let mut next = advance(booking, BookingStatus::Failed, now);
    next.reservation.hold_status = HoldStatus::Expired;
    let detail = match &booking.reservation.hold_id {
        Some(hold_id) => format!("Hold {hold_id} expired before the booking was confirmed"),
        None => "Slot claim lapsed before the booking was confirmed".to_string(),
    };
    next.timeline.push(TimelineStep::failed(timeline::HOLD_EXPIRED, detail, now));
    next.timeline.push(TimelineStep::failed(
        timeline::BOOKING_FAILED,
        "hold_expired: reservation lapsed",
        now,
    ));
    let intents = rollback_intents(booking, booking.total_amount, "hold expired");
    Ok(Transition::with_intents(next, intents))
}
