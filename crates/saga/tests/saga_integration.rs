//! Integration tests for the booking saga.

use std::sync::Arc;

use booking_store::{BookingStore, InMemoryBookingStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::BookingId;
use domain::{
    Booking, BookingRequest, BookingStatus, CancellationPolicy, CancellationWindow, ContactInfo,
    DenialReason, HoldStatus, Money, PaymentStatus, ServiceType, StepOutcome, TransitionError,
    timeline,
};
use saga::{
    BookingError, BookingOrchestrator, Clock, InMemoryHoldService, InMemoryPaymentService,
    InMemoryProviderMetrics, ManualClock, PaymentErrorCode, ReservationHoldClient, SagaConfig,
};

type TestOrchestrator = BookingOrchestrator<
    InMemoryBookingStore,
    InMemoryHoldService,
    InMemoryPaymentService,
    InMemoryProviderMetrics,
>;

struct TestHarness {
    orchestrator: TestOrchestrator,
    clock: ManualClock,
    store: InMemoryBookingStore,
    holds: InMemoryHoldService,
    payments: InMemoryPaymentService,
    provider: InMemoryProviderMetrics,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(SagaConfig::default())
    }

    fn with_config(config: SagaConfig) -> Self {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 11, 2, 8, 0, 0).unwrap());
        let store = InMemoryBookingStore::new();
        let holds = InMemoryHoldService::with_clock(Arc::new(clock.clone()));
        let payments = InMemoryPaymentService::new();
        let provider = InMemoryProviderMetrics::new();

        let orchestrator = BookingOrchestrator::new(
            store.clone(),
            holds.clone(),
            payments.clone(),
            provider.clone(),
            config,
        )
        .with_clock(Arc::new(clock.clone()));

        Self {
            orchestrator,
            clock,
            store,
            holds,
            payments,
            provider,
        }
    }

    fn day(&self, offset: i64) -> DateTime<Utc> {
        self.clock.now() + Duration::days(offset)
    }

    fn request(&self, service_type: ServiceType, from_day: i64, to_day: i64) -> BookingRequest {
        BookingRequest {
            user_id: "traveller-1".into(),
            service_type: Some(service_type),
            service_id: "svc-42".into(),
            service_name: Some("Kandy day tour".into()),
            provider_id: "provider-42".into(),
            start_date: Some(self.day(from_day)),
            end_date: Some(self.day(to_day)),
            total_amount: Some(Money::from_cents(10_000)),
            currency: Some("USD".into()),
            cancellation_policy: Some(CancellationPolicy::free_until(
                CancellationWindow::Anytime,
            )),
            contact_info: Some(ContactInfo {
                email: "traveller@example.com".into(),
                phone: "+94 71 234 5678".into(),
                ..ContactInfo::default()
            }),
            ..BookingRequest::default()
        }
    }

    async fn stored(&self, booking_id: BookingId) -> Booking {
        self.orchestrator.get(booking_id).await.unwrap()
    }
}

#[tokio::test]
async fn test_happy_path_confirms_booking() {
    let h = TestHarness::new();

    let booking = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 10, 12))
        .await
        .unwrap();

    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.total_amount, Money::from_cents(10_000));
    assert_eq!(booking.currency.as_str(), "USD");
    let tx = booking.payment.transaction_id.clone().unwrap();
    assert!(h.payments.has_payment(&tx));
    assert_eq!(h.payments.payment_count(), 1);
    assert_eq!(h.provider.booking_count("accommodation", "svc-42"), 1);
    assert!(booking.reservation.confirmation_id.is_some());

    let steps: Vec<&str> = booking.timeline.iter().map(|s| s.step.as_str()).collect();
    assert_eq!(
        steps,
        [
            timeline::BOOKING_CREATED,
            timeline::RESERVATION_CREATED,
            timeline::SLOT_RESERVED,
            timeline::PAYMENT_CHARGED,
            timeline::RESERVATION_CONFIRMED,
            timeline::PAYMENT_COMPLETED,
            timeline::BOOKING_CONFIRMED,
        ]
    );

    let found = h
        .orchestrator
        .get_by_confirmation_number(booking.confirmation_number.as_str())
        .await
        .unwrap();
    assert_eq!(found.booking_id, booking.booking_id);
}

#[tokio::test]
async fn test_back_to_back_ranges_do_not_conflict() {
    let h = TestHarness::new();

    let first = h
        .orchestrator
        .book(h.request(ServiceType::Guide, 5, 7))
        .await
        .unwrap();
    let second = h
        .orchestrator
        .book(h.request(ServiceType::Guide, 7, 9))
        .await
        .unwrap();

    assert_eq!(first.status, BookingStatus::Confirmed);
    assert_eq!(second.status, BookingStatus::Confirmed);
    assert!(h.provider.is_blocked(&first.provider_id, &first.date_range));
    assert!(h.provider.is_blocked(&second.provider_id, &second.date_range));
}

#[tokio::test]
async fn test_overlapping_request_reports_existing_range() {
    let h = TestHarness::new();
    let first = h
        .orchestrator
        .book(h.request(ServiceType::Guide, 5, 8))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .book(h.request(ServiceType::Guide, 7, 9))
        .await
        .unwrap_err();

    match err {
        BookingError::Conflict { conflicting } => {
            assert_eq!(conflicting.booking_id, first.booking_id);
            assert_eq!(conflicting.date_range, first.date_range);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert_eq!(h.store.booking_count().await, 1);
    assert_eq!(h.holds.hold_count(), 1);
}

#[tokio::test]
async fn test_second_overlapping_payment_is_reverted() {
    let h = TestHarness::new();
    let first = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 5, 8))
        .await
        .unwrap();
    let second = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 6, 9))
        .await
        .unwrap();

    let paid = h.orchestrator.pay(first.booking_id, None).await.unwrap();
    assert_eq!(paid.status, BookingStatus::Confirmed);

    let err = h.orchestrator.pay(second.booking_id, None).await.unwrap_err();
    match err {
        BookingError::Conflict { conflicting } => {
            assert_eq!(conflicting.booking_id, first.booking_id);
            assert_eq!(conflicting.date_range, first.date_range);
        }
        other => panic!("expected Conflict, got {other:?}"),
    }

    let reverted = h.stored(second.booking_id).await;
    assert_eq!(reverted.status, BookingStatus::Pending);
    assert!(reverted.has_step(timeline::CONFLICT_DETECTED));
    assert_eq!(h.payments.payment_count(), 1);
}

#[tokio::test]
async fn test_concurrent_payments_have_one_winner() {
    let h = TestHarness::new();
    let a = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 10, 12))
        .await
        .unwrap();
    let b = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 11, 13))
        .await
        .unwrap();

    let (ra, rb) = tokio::join!(
        h.orchestrator.pay(a.booking_id, None),
        h.orchestrator.pay(b.booking_id, None)
    );

    let winners: Vec<&Booking> = [&ra, &rb].into_iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = if ra.is_ok() { b.booking_id } else { a.booking_id };
    assert!(matches!(
        [&ra, &rb].into_iter().find(|r| r.is_err()),
        Some(Err(BookingError::Conflict { .. }))
    ));

    assert_eq!(h.stored(winners[0].booking_id).await.status, BookingStatus::Confirmed);
    assert_eq!(h.stored(loser).await.status, BookingStatus::Pending);
    assert_eq!(h.payments.payment_count(), 1);
}

#[tokio::test]
async fn test_approved_guide_locks_dates() {
    let h = TestHarness::new();
    let first = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 5, 6))
        .await
        .unwrap();
    let approved = h.orchestrator.approve(first.booking_id).await.unwrap();
    assert_eq!(approved.status, BookingStatus::Approved);

    let err = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 5, 6))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Conflict { .. }));

    let again = h.orchestrator.approve(first.booking_id).await.unwrap_err();
    assert!(matches!(
        again,
        BookingError::Transition(TransitionError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_approved_guide_without_lock_in_leaves_dates_open() {
    let h = TestHarness::with_config(SagaConfig {
        lock_in_approved_guides: false,
        ..SagaConfig::default()
    });
    let first = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 5, 6))
        .await
        .unwrap();
    h.orchestrator.approve(first.booking_id).await.unwrap();

    let second = h
        .orchestrator
        .request_booking(h.request(ServiceType::Guide, 5, 6))
        .await
        .unwrap();
    assert_eq!(second.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_decline_records_reason() {
    let h = TestHarness::new();
    let booking = h
        .orchestrator
        .request_booking(h.request(ServiceType::Transportation, 3, 4))
        .await
        .unwrap();

    let declined = h
        .orchestrator
        .decline(booking.booking_id, Some("vehicle in service".into()))
        .await
        .unwrap();
    assert_eq!(declined.status, BookingStatus::Declined);
    assert_eq!(declined.decline_reason.as_deref(), Some("vehicle in service"));

    let err = h.orchestrator.pay(booking.booking_id, None).await.unwrap_err();
    assert!(matches!(err, BookingError::Transition(_)));
}

#[tokio::test]
async fn test_payment_outage_releases_hold() {
    let h = TestHarness::new();
    h.payments.set_unavailable(true);

    let err = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 10, 12))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::UpstreamUnavailable {
            service: "payment",
            ..
        }
    ));
    assert_eq!(err.error_code(), "SERVICE_UNAVAILABLE");

    let failed = h.store.list_by_status(BookingStatus::PaymentFailed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].payment.error_code.as_deref(), Some("SERVICE_UNAVAILABLE"));
    assert!(failed[0].payment.transaction_id.is_none());
    assert_eq!(h.holds.active_hold_count(), 0);
    assert_eq!(h.provider.booking_count("accommodation", "svc-42"), 0);
}

#[tokio::test]
async fn test_failed_release_keeps_the_decline() {
    let h = TestHarness::new();
    h.payments.set_decline(Some(PaymentErrorCode::CardDeclined));
    h.holds.set_fail_on_cancel(true);

    let err = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 10, 12))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::PaymentDeclined {
            code: PaymentErrorCode::CardDeclined
        }
    ));
    assert_eq!(err.error_code(), "CARD_DECLINED");

    let failed = h.store.list_by_status(BookingStatus::PaymentFailed).await.unwrap();
    assert_eq!(failed.len(), 1);
    let release = failed[0]
        .timeline
        .iter()
        .rfind(|s| s.step == timeline::RESERVATION_CANCELLED)
        .unwrap();
    assert_eq!(release.status, StepOutcome::Failed);
    assert!(h.holds.cancel_calls() >= 1);
    assert_eq!(h.holds.active_hold_count(), 1);
    assert_eq!(h.payments.payment_count(), 0);
}

#[tokio::test]
async fn test_provider_outage_keeps_booking_confirmed() {
    let h = TestHarness::new();
    h.provider.set_fail_all(true);

    let booking = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 10, 12))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment.status, PaymentStatus::Completed);

    let stored = h.stored(booking.booking_id).await;
    assert_eq!(stored.status, BookingStatus::Confirmed);
    assert_eq!(stored.reservation.hold_status, HoldStatus::Confirmed);
    assert_eq!(h.provider.booking_count("accommodation", "svc-42"), 0);
    assert_eq!(h.payments.payment_count(), 1);
    assert!(stored.payment.refund_id.is_none());
}

#[tokio::test]
async fn test_failed_hold_confirmation_refunds_then_releases() {
    let h = TestHarness::new();
    h.holds.set_fail_on_confirm(true);

    let err = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 10, 12))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::UpstreamUnavailable {
            service: "reservation",
            ..
        }
    ));

    let failed = h.store.list_by_status(BookingStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    let booking = &failed[0];
    let tx = booking.payment.transaction_id.clone().unwrap();
    assert_eq!(h.payments.refunded_amount(&tx), Some(Money::from_cents(10_000)));
    assert_eq!(booking.payment.status, PaymentStatus::Refunded);
    assert_eq!(booking.reservation.hold_status, HoldStatus::Cancelled);
    assert_eq!(h.holds.active_hold_count(), 0);

    let position = |step: &str| booking.timeline.iter().position(|s| s.step == step).unwrap();
    assert!(position(timeline::PAYMENT_REFUNDED) < position(timeline::RESERVATION_CANCELLED));
}

#[tokio::test]
async fn test_no_capacity_fails_booking() {
    let h = TestHarness::new();
    h.holds.set_no_capacity(true);

    let err = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 10, 12))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::ResourceUnavailable(_)));

    let failed = h.store.list_by_status(BookingStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(h.payments.payment_count(), 0);
}

#[tokio::test]
async fn test_cancel_refunds_and_releases() {
    let h = TestHarness::new();
    let booking = h
        .orchestrator
        .book(h.request(ServiceType::Guide, 20, 21))
        .await
        .unwrap();
    let tx = booking.payment.transaction_id.clone().unwrap();
    let hold_id = booking.reservation.hold_id.clone().unwrap();

    let cancelled = h
        .orchestrator
        .cancel(booking.booking_id, "change of plans")
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("change of plans"));
    assert_eq!(cancelled.payment.status, PaymentStatus::Refunded);
    assert_eq!(cancelled.payment.refund_amount, Money::from_cents(10_000));
    assert_eq!(cancelled.reservation.hold_status, HoldStatus::Cancelled);
    assert_eq!(h.payments.refunded_amount(&tx), Some(Money::from_cents(10_000)));
    assert_eq!(h.holds.hold_status(&hold_id), Some(HoldStatus::Cancelled));
    assert_eq!(h.provider.booking_count("guide", "svc-42"), 0);
    assert!(!h.provider.is_blocked(&booking.provider_id, &booking.date_range));

    // Releasing an already released hold is a no-op.
    h.holds.cancel_hold(&hold_id, "again").await.unwrap();

    let err = h
        .orchestrator
        .cancel(booking.booking_id, "again")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::Transition(TransitionError::InvalidTransition { .. })
    ));
    assert_eq!(h.payments.refunded_amount(&tx), Some(Money::from_cents(10_000)));
}

#[tokio::test]
async fn test_cancel_inside_window_is_denied() {
    let h = TestHarness::new();
    let mut request = h.request(ServiceType::Guide, 3, 4);
    request.cancellation_policy = Some(CancellationPolicy::free_until(
        CancellationWindow::SevenDaysBefore,
    ));
    let booking = h.orchestrator.book(request).await.unwrap();

    let preview = h
        .orchestrator
        .evaluate_cancellation(booking.booking_id)
        .await
        .unwrap();
    assert!(!preview.allowed);
    assert_eq!(preview.days_until_start, Some(3));
    assert_eq!(preview.required_days, Some(7));

    let err = h
        .orchestrator
        .cancel(booking.booking_id, "too late")
        .await
        .unwrap_err();
    match err {
        BookingError::Transition(TransitionError::CancellationNotAllowed(decision)) => {
            assert!(!decision.allowed);
            assert_eq!(decision.days_until_start, Some(3));
            assert_eq!(decision.required_days, Some(7));
            assert_eq!(decision.refund_amount, Money::zero());
        }
        other => panic!("expected CancellationNotAllowed, got {other:?}"),
    }
    assert_eq!(h.stored(booking.booking_id).await.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_no_free_cancellation_is_always_denied() {
    let h = TestHarness::new();
    let mut request = h.request(ServiceType::Accommodation, 90, 95);
    request.cancellation_policy = Some(CancellationPolicy {
        free_cancellation: false,
        free_cancellation_window: CancellationWindow::Anytime,
    });
    let booking = h.orchestrator.book(request).await.unwrap();

    let decision = h
        .orchestrator
        .evaluate_cancellation(booking.booking_id)
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenialReason::NoFreeCancellation));

    let err = h
        .orchestrator
        .cancel(booking.booking_id, "changed mind")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CANCELLATION_NOT_ALLOWED");
}

#[tokio::test]
async fn test_pending_cancel_needs_no_refund() {
    let h = TestHarness::new();
    let booking = h
        .orchestrator
        .request_booking(h.request(ServiceType::Transportation, 1, 2))
        .await
        .unwrap();

    let cancelled = h
        .orchestrator
        .cancel(booking.booking_id, "duplicate request")
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment.refund_amount, Money::zero());
    assert_eq!(h.holds.cancel_calls(), 0);
}

#[tokio::test]
async fn test_complete_after_end_date() {
    let h = TestHarness::new();
    let booking = h
        .orchestrator
        .book(h.request(ServiceType::Transportation, 1, 2))
        .await
        .unwrap();

    let err = h.orchestrator.complete(booking.booking_id).await.unwrap_err();
    assert_eq!(err.error_code(), "BOOKING_NOT_ENDED");

    h.clock.advance(Duration::days(3));
    let completed = h.orchestrator.complete(booking.booking_id).await.unwrap();
    assert_eq!(completed.status, BookingStatus::Completed);
    assert!(completed.completed_at.is_some());
}

#[tokio::test]
async fn test_reconcile_payment_reports_processor_status() {
    let h = TestHarness::new();
    let booking = h
        .orchestrator
        .book(h.request(ServiceType::Accommodation, 30, 31))
        .await
        .unwrap();

    let report = h
        .orchestrator
        .reconcile_payment(booking.booking_id)
        .await
        .unwrap();
    assert_eq!(Some(report.transaction_id), booking.payment.transaction_id);
    assert_eq!(report.status, "completed");

    let pending = h
        .orchestrator
        .request_booking(h.request(ServiceType::Accommodation, 40, 41))
        .await
        .unwrap();
    let err = h
        .orchestrator
        .reconcile_payment(pending.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::NoTransaction(_)));
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_storage() {
    let h = TestHarness::new();
    let mut request = h.request(ServiceType::Accommodation, 12, 10);
    request.contact_info = None;

    let err = h.orchestrator.book(request).await.unwrap_err();
    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    let message = err.user_message();
    assert!(message.contains("contactInfo"));
    assert_eq!(h.store.booking_count().await, 0);
}

#[tokio::test]
async fn test_unknown_booking_is_not_found() {
    let h = TestHarness::new();
    let err = h.orchestrator.get(BookingId::new()).await.unwrap_err();
    assert!(matches!(err, BookingError::NotFound(_)));

    let err = h
        .orchestrator
        .get_by_confirmation_number("BK-NOPE")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_FOUND");
}
