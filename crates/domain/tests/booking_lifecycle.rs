//! Integration tests for the booking record.
//!
//! These tests drive a booking through its full lifecycle using only the
//! public transition functions, checking status, intents and timeline.

use chrono::{DateTime, Duration, TimeZone, Utc};
use domain::{
    Booking, BookingRequest, BookingStatus, CancellationPolicy, CancellationWindow, ChargeReceipt,
    ContactInfo, Currency, DenialReason, HoldGrant, HoldStatus, Intent, IntentOutcome, Money,
    PaymentMethod, PaymentStatus, ServiceType, Settlement, TransitionError, active_statuses,
    find_conflict, policy, timeline, transitions,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap()
}

fn request(service_type: ServiceType, start: DateTime<Utc>, days: i64) -> BookingRequest {
    BookingRequest {
        user_id: "user-11".into(),
        service_type: Some(service_type),
        service_id: "svc-11".into(),
        provider_id: "provider-11".into(),
        start_date: Some(start),
        end_date: Some(start + Duration::days(days)),
        total_amount: Some(Money::from_major(300)),
        currency: Some("USD".into()),
        cancellation_policy: Some(CancellationPolicy::free_until(
            CancellationWindow::SevenDaysBefore,
        )),
        contact_info: Some(ContactInfo {
            email: "traveller@example.com".into(),
            phone: "+94 11 000 0000".into(),
            ..ContactInfo::default()
        }),
        ..BookingRequest::default()
    }
}

fn create(service_type: ServiceType, start: DateTime<Utc>) -> Booking {
    let new = request(service_type, start, 3)
        .validate(&Currency::default())
        .unwrap();
    Booking::create(new, now())
}

fn grant(id: &str) -> HoldGrant {
    HoldGrant {
        hold_id: id.into(),
        expires_at: now() + Duration::minutes(15),
    }
}

fn receipt() -> ChargeReceipt {
    ChargeReceipt {
        transaction_id: "TX-11".into(),
        processing_fee: Some(Money::from_cents(870)),
        method: PaymentMethod::Card,
    }
}

/// Runs hold, claim, charge and confirm, returning the confirmed booking.
fn confirmed(service_type: ServiceType, start: DateTime<Utc>) -> Booking {
    let booking = create(service_type, start);
    let held = transitions::record_hold(&booking, &grant("HOLD-1"), now())
        .unwrap()
        .booking;
    let reserved = transitions::claim_slot(&held, now() + Duration::minutes(15), now())
        .unwrap()
        .booking;
    let charged = transitions::record_charge(&reserved, &receipt(), now())
        .unwrap()
        .booking;
    transitions::confirm(
        &charged,
        Some("CONF-1"),
        &Settlement::Charged(receipt()),
        now(),
    )
    .unwrap()
    .booking
}

fn steps(booking: &Booking) -> Vec<&str> {
    booking.timeline.iter().map(|s| s.step.as_str()).collect()
}

mod booking_lifecycle {
    use super::*;

    #[test]
    fn complete_booking_lifecycle() {
        let start = now() + Duration::days(30);
        let booking = confirmed(ServiceType::Accommodation, start);

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment.status, PaymentStatus::Completed);
        assert_eq!(booking.reservation.hold_status, HoldStatus::Confirmed);
        assert_eq!(booking.currency.as_str(), "USD");
        assert_eq!(
            steps(&booking),
            vec![
                timeline::BOOKING_CREATED,
                timeline::RESERVATION_CREATED,
                timeline::SLOT_RESERVED,
                timeline::PAYMENT_CHARGED,
                timeline::RESERVATION_CONFIRMED,
                timeline::PAYMENT_COMPLETED,
                timeline::BOOKING_CONFIRMED,
            ]
        );

        let early = transitions::complete(&booking, start);
        assert!(matches!(early, Err(TransitionError::NotYetEnded { .. })));

        let done = transitions::complete(&booking, start + Duration::days(4))
            .unwrap()
            .booking;
        assert_eq!(done.status, BookingStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.status.is_terminal());
    }

    #[test]
    fn guide_confirmation_blocks_calendar() {
        let transition = {
            let booking = create(ServiceType::Guide, now() + Duration::days(10));
            let held = transitions::record_hold(&booking, &grant("HOLD-2"), now())
                .unwrap()
                .booking;
            let reserved = transitions::claim_slot(&held, now() + Duration::minutes(15), now())
        .unwrap()
        .booking;
            transitions::confirm(
                &reserved,
                Some("CONF-2"),
                &Settlement::Bypassed {
                    reference: "BYPASS-1".into(),
                },
                now(),
            )
            .unwrap()
        };

        assert!(
            transition
                .intents
                .iter()
                .any(|i| matches!(i, Intent::BlockProviderCalendar { .. }))
        );
        assert!(transition.booking.has_step(timeline::PAYMENT_SKIPPED));
        assert_eq!(
            transition.booking.payment.transaction_id.as_deref(),
            Some("BYPASS-1")
        );
    }

    #[test]
    fn provider_decline_is_terminal() {
        let booking = create(ServiceType::Guide, now() + Duration::days(10));
        let declined = transitions::decline(&booking, Some("On leave"), now())
            .unwrap()
            .booking;

        assert_eq!(declined.status, BookingStatus::Declined);
        assert_eq!(declined.decline_reason.as_deref(), Some("On leave"));
        assert!(matches!(
            transitions::claim_slot(&declined, now() + Duration::minutes(15), now()),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn cancel_refunds_then_releases_hold() {
        let start = now() + Duration::days(30);
        let booking = confirmed(ServiceType::Accommodation, start);
        let decision = policy::evaluate(&booking, &booking.cancellation_policy, now());
        assert!(decision.allowed);
        assert_eq!(decision.refund_amount, Money::from_major(300));

        let transition = transitions::cancel(&booking, "Change of plans", &decision, now()).unwrap();
        assert_eq!(transition.booking.status, BookingStatus::Cancelled);

        let refund_at = transition
            .intents
            .iter()
            .position(|i| matches!(i, Intent::Refund { .. }))
            .unwrap();
        let release_at = transition
            .intents
            .iter()
            .position(|i| matches!(i, Intent::CancelHold { .. }))
            .unwrap();
        assert!(refund_at < release_at);

        let outcomes: Vec<IntentOutcome> = transition
            .intents
            .iter()
            .filter(|i| matches!(i, Intent::Refund { .. } | Intent::CancelHold { .. }))
            .map(|i| IntentOutcome::succeeded(i.clone(), Some("RF-1".into())))
            .collect();
        let settled = transitions::record_compensation(&transition.booking, &outcomes, now()).booking;

        assert_eq!(settled.payment.status, PaymentStatus::Refunded);
        assert_eq!(settled.payment.refund_amount, Money::from_major(300));
        assert_eq!(settled.reservation.hold_status, HoldStatus::Cancelled);
        assert_eq!(
            settled.last_step().map(|s| s.step.as_str()),
            Some(timeline::BOOKING_CANCELLED)
        );
    }

    #[test]
    fn cancel_inside_window_is_denied() {
        let start = now() + Duration::days(3);
        let booking = confirmed(ServiceType::Accommodation, start);
        let decision = policy::evaluate(&booking, &booking.cancellation_policy, now());

        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            Some(DenialReason::WindowClosed {
                days_until_start: 3,
                required_days: 7,
            })
        );

        let result = transitions::cancel(&booking, "Change of plans", &decision, now());
        assert!(matches!(
            result,
            Err(TransitionError::CancellationNotAllowed(_))
        ));
    }

    #[test]
    fn pending_booking_cancels_without_refund() {
        let booking = create(ServiceType::Transportation, now() + Duration::days(2));
        let decision = policy::evaluate(&booking, &booking.cancellation_policy, now());

        let transition = transitions::cancel(&booking, "No longer needed", &decision, now()).unwrap();

        assert_eq!(transition.booking.status, BookingStatus::Cancelled);
        assert!(transition.intents.is_empty());
    }
}

mod availability {
    use super::*;

    #[test]
    fn only_active_bookings_block_dates() {
        let start = now() + Duration::days(5);
        let active = confirmed(ServiceType::Accommodation, start);
        let mut failed = create(ServiceType::Accommodation, start);
        failed.status = BookingStatus::Failed;

        let candidate = create(ServiceType::Accommodation, start + Duration::days(1));
        let statuses = active_statuses(ServiceType::Accommodation, true);
        let existing = [failed, active.clone()];

        let conflict = find_conflict(
            &candidate.date_range,
            &statuses,
            Some(candidate.booking_id),
            &existing,
        )
        .unwrap();
        assert_eq!(conflict.booking_id, active.booking_id);

        let back_to_back = create(ServiceType::Accommodation, active.date_range.end_date);
        assert!(
            find_conflict(&back_to_back.date_range, &statuses, None, &existing).is_none()
        );
    }
}
