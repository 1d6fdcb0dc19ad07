//! Cancellation policy evaluation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{Booking, CancellationPolicy};
use super::state::BookingStatus;
use super::value_objects::Money;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Why a cancellation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenialReason {
    AlreadyTerminal { status: BookingStatus },
    NoFreeCancellation,
    WindowClosed { days_until_start: i64, required_days: i64 },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::AlreadyTerminal { status } => {
                write!(f, "Booking is already {status} and cannot be cancelled")
            }
            DenialReason::NoFreeCancellation => {
                f.write_str("This booking does not offer free cancellation")
            }
            DenialReason::WindowClosed {
                days_until_start,
                required_days,
            } => write!(
                f,
                "Free cancellation requires at least {required_days} day(s) notice; \
                 the booking starts in {days_until_start} day(s)"
            ),
        }
    }
}

/// Outcome of evaluating a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
    pub refund_amount: Money,
    pub days_until_start: Option<i64>,
    pub required_days: Option<i64>,
}

impl CancellationDecision {
    fn denied(reason: DenialReason, days_until_start: Option<i64>, required_days: Option<i64>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            refund_amount: Money::zero(),
            days_until_start,
            required_days,
        }
    }
}

/// Whole days until `start`, rounded up. Negative once the start has passed.
pub fn days_until(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (start - now).num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

/// Decides whether `booking` may be cancelled at `now` under `policy`.
///
/// Rules apply in order: terminal bookings are refused, then bookings without
/// free cancellation, then bookings inside the notice window. Allowed
/// cancellations always refund the full amount.
pub fn evaluate(
    booking: &Booking,
    policy: &CancellationPolicy,
    now: DateTime<Utc>,
) -> CancellationDecision {
    if booking.status.is_terminal() {
        return CancellationDecision::denied(
            DenialReason::AlreadyTerminal {
                status: booking.status,
            },
            None,
            None,
        );
    }

    if !policy.free_cancellation {
        return CancellationDecision::denied(DenialReason::NoFreeCancellation, None, None);
    }

    let days_until_start = days_until(booking.date_range.start_date, now);
    let required_days = policy.free_cancellation_window.required_days();

    if days_until_start < required_days {
        return CancellationDecision::denied(
            DenialReason::WindowClosed {
                days_until_start,
                required_days,
            },
            Some(days_until_start),
            Some(required_days),
        );
    }

    CancellationDecision {
        allowed: true,
        reason: None,
        refund_amount: booking.total_amount,
        days_until_start: Some(days_until_start),
        required_days: Some(required_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::model::CancellationWindow;
    use crate::booking::test_support::confirmed_booking;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_days_until_rounds_up() {
        let now = now();
        assert_eq!(days_until(now + Duration::days(3), now), 3);
        assert_eq!(days_until(now + Duration::days(2) + Duration::minutes(1), now), 3);
        assert_eq!(days_until(now, now), 0);
        assert_eq!(days_until(now - Duration::hours(5), now), 0);
        assert_eq!(days_until(now - Duration::days(2), now), -2);
    }

    #[test]
    fn test_terminal_booking_is_refused() {
        let mut booking = confirmed_booking(now() + Duration::days(30));
        let policy = CancellationPolicy::free_until(CancellationWindow::Anytime);
        for status in [BookingStatus::Cancelled, BookingStatus::Completed] {
            booking.status = status;
            let decision = evaluate(&booking, &policy, now());
            assert!(!decision.allowed);
            assert_eq!(
                decision.reason,
                Some(DenialReason::AlreadyTerminal { status })
            );
        }
    }

    #[test]
    fn test_no_free_cancellation_is_always_refused() {
        let policy = CancellationPolicy::default();
        for offset in [-10, 0, 1, 7, 365] {
            let booking = confirmed_booking(now() + Duration::days(offset));
            let decision = evaluate(&booking, &policy, now());
            assert!(!decision.allowed, "offset {offset}");
            assert_eq!(decision.reason, Some(DenialReason::NoFreeCancellation));
            assert_eq!(decision.refund_amount, Money::zero());
        }
    }

    #[test]
    fn test_seven_day_window_three_days_out_is_refused() {
        let booking = confirmed_booking(now() + Duration::days(3));
        let policy = CancellationPolicy::free_until(CancellationWindow::SevenDaysBefore);

        let decision = evaluate(&booking, &policy, now());

        assert!(!decision.allowed);
        assert_eq!(decision.days_until_start, Some(3));
        assert_eq!(decision.required_days, Some(7));
        let message = decision.reason.unwrap().to_string();
        assert!(message.contains('7') && message.contains('3'));
    }

    #[test]
    fn test_inside_window_refunds_full_amount() {
        let booking = confirmed_booking(now() + Duration::days(14));
        let policy = CancellationPolicy::free_until(CancellationWindow::FourteenDaysBefore);

        let decision = evaluate(&booking, &policy, now());

        assert!(decision.allowed);
        assert_eq!(decision.refund_amount, booking.total_amount);
        assert_eq!(decision.reason, None);
    }

    #[test]
    fn test_anytime_allows_even_after_start() {
        let booking = confirmed_booking(now() - Duration::hours(2));
        let policy = CancellationPolicy::free_until(CancellationWindow::Anytime);
        assert!(evaluate(&booking, &policy, now()).allowed);
    }

    #[test]
    fn test_decision_serializes_for_clients() {
        let booking = confirmed_booking(now() + Duration::days(3));
        let policy = CancellationPolicy::free_until(CancellationWindow::SevenDaysBefore);
        let json = serde_json::to_value(evaluate(&booking, &policy, now())).unwrap();
        assert_eq!(json["allowed"], false);
        assert_eq!(json["requiredDays"], 7);
        assert_eq!(json["daysUntilStart"], 3);
        assert_eq!(json["reason"]["code"], "window_closed");
    }
}
