//! Booking saga orchestrator.

use std::sync::Arc;
use std::time::Instant;

use booking_store::{BookingStore, BookingStoreExt, SlotGuard, UpdateOptions};
use chrono::{DateTime, Utc};
use common::BookingId;
use domain::{
    Booking, BookingRequest, BookingStatus, CancellationDecision, ChargeReceipt, HoldGrant, Intent,
    IntentOutcome, Money, PaymentMethod, Settlement, ServiceType, TransitionError,
    active_statuses, policy, timeline, transitions,
};

use crate::availability::{AvailabilityChecker, StoreAvailabilityChecker};
use crate::clock::{Clock, SystemClock};
use crate::compensation::{IntentExecutor, bounded};
use crate::config::{PaymentMode, SagaConfig};
use crate::error::{BookingError, HoldError, PaymentClientError, Result};
use crate::services::{
    ChargeOutcome, ChargeRequest, HoldRequest, PaymentClient, PaymentStatusReport,
    ProviderMetricsClient, ReservationHoldClient,
};
use crate::steps;

/// What a [`BookingOrchestrator::sweep`] pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Reserved bookings failed because their hold lapsed.
    pub expired_holds: usize,
    /// Confirmed bookings completed because their end date passed.
    pub completed: usize,
    /// Bookings the pass could not update.
    pub errors: usize,
}

/// Drives bookings through hold, payment and confirmation, compensating on
/// failure.
///
/// Every write goes through the store's conditional update, so two calls
/// for the same booking can never both apply a transition: the loser gets
/// [`BookingError::StateConflict`].
pub struct BookingOrchestrator<S, H, P, M>
where
    S: BookingStore,
    H: ReservationHoldClient,
    P: PaymentClient,
    M: ProviderMetricsClient,
{
    store: S,
    holds: H,
    payments: P,
    provider: M,
    availability: Arc<dyn AvailabilityChecker>,
    clock: Arc<dyn Clock>,
    config: SagaConfig,
}

impl<S, H, P, M> BookingOrchestrator<S, H, P, M>
where
    S: BookingStore + Clone + 'static,
    H: ReservationHoldClient,
    P: PaymentClient,
    M: ProviderMetricsClient,
{
    /// Creates an orchestrator that checks availability against `store`.
    pub fn new(store: S, holds: H, payments: P, provider: M, config: SagaConfig) -> Self {
        let availability = Arc::new(StoreAvailabilityChecker::new(store.clone()));
        Self {
            store,
            holds,
            payments,
            provider,
            availability,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replaces the wall clock, e.g. with a manual one in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Checks overlaps with `checker` instead of scanning the store.
    pub fn with_availability_checker(mut self, checker: Arc<dyn AvailabilityChecker>) -> Self {
        self.availability = checker;
        self
    }

    /// Returns the settings this orchestrator runs with.
    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Returns the underlying booking store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs the full saga: create, hold, claim, charge, confirm, finalize.
    ///
    /// On any mid-saga failure the booking is marked `failed` (or
    /// `payment_failed` when the charge was refused) and whatever was taken
    /// is given back before the error is returned.
    #[tracing::instrument(
        skip(self, request),
        fields(saga_type = steps::SAGA_TYPE, service_id = %request.service_id)
    )]
    pub async fn book(&self, request: BookingRequest) -> Result<Booking> {
        metrics::counter!("booking_saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let booking = self.create_pending(request).await?;
        let booking_id = booking.booking_id;
        let result = self.run_saga(booking).await;

        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("booking_saga_duration_seconds").record(duration);
        if result.is_ok() {
            metrics::counter!("booking_saga_completed_total").increment(1);
            tracing::info!(%booking_id, duration, "saga completed successfully");
        }
        result
    }

    /// Validates the request, checks availability and stores a `pending`
    /// booking. No remote service is called.
    #[tracing::instrument(skip(self, request), fields(service_id = %request.service_id))]
    pub async fn request_booking(&self, request: BookingRequest) -> Result<Booking> {
        self.create_pending(request).await
    }

    /// Provider approval: `pending → approved`.
    #[tracing::instrument(skip(self))]
    pub async fn approve(&self, booking_id: BookingId) -> Result<Booking> {
        let booking = self.store.get(booking_id).await?;
        let transition = transitions::approve(&booking, self.now())?;

        // Another booking may have taken the dates since creation.
        self.ensure_available(&booking).await?;

        let locks_dates = booking.service_type == ServiceType::Guide
            && self.config.lock_in_approved_guides;
        let approved = if locks_dates {
            self.commit_guarded(&booking, transition.booking).await
        } else {
            self.commit(&booking, transition.booking).await
        };
        let approved = approved.inspect_err(|err| self.note_conflict(err))?;
        tracing::info!(confirmation_number = %approved.confirmation_number, "booking approved");
        Ok(approved)
    }

    /// Provider decline: `pending → declined`.
    #[tracing::instrument(skip(self))]
    pub async fn decline(&self, booking_id: BookingId, reason: Option<String>) -> Result<Booking> {
        let booking = self.store.get(booking_id).await?;
        let transition = transitions::decline(&booking, reason.as_deref(), self.now())?;
        let declined = self.commit(&booking, transition.booking).await?;
        tracing::info!(confirmation_number = %declined.confirmation_number, "booking declined");
        Ok(declined)
    }

    /// Pays for a `pending` or `approved` booking and confirms it.
    ///
    /// The date range is checked a final time and claimed atomically before
    /// any money moves. A booking that loses the dates is reverted to
    /// `pending` and a [`BookingError::Conflict`] names the winner's range.
    #[tracing::instrument(skip(self), fields(saga_type = steps::SAGA_TYPE))]
    pub async fn pay(
        &self,
        booking_id: BookingId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<Booking> {
        metrics::counter!("booking_saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let booking = self.store.get(booking_id).await?;
        let now = self.now();
        let mut claim = transitions::claim_slot(&booking, self.claim_deadline(now), now)?;
        if let Some(method) = payment_method {
            claim.booking.payment.method = method;
        }

        tracing::info!(step = steps::STEP_CHECK_AVAILABILITY, "saga step started");
        if let Err(err) = self.ensure_available(&booking).await {
            return Err(self.revert_on_conflict(booking, err).await);
        }

        tracing::info!(step = steps::STEP_CLAIM_SLOT, "saga step started");
        let reserved = match self.commit_guarded(&booking, claim.booking).await {
            Ok(reserved) => reserved,
            Err(err) => {
                self.note_conflict(&err);
                return Err(self.revert_on_conflict(booking, err).await);
            }
        };

        let result = self.settle_and_confirm(reserved).await;
        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("booking_saga_duration_seconds").record(duration);
        if result.is_ok() {
            metrics::counter!("booking_saga_completed_total").increment(1);
            tracing::info!(%booking_id, duration, "payment saga completed successfully");
        }
        result
    }

    /// Cancels a non-terminal booking, refunding and releasing what it holds.
    ///
    /// A confirmed booking must pass its cancellation policy snapshot;
    /// otherwise the policy decision comes back inside the error.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(&self, booking_id: BookingId, reason: &str) -> Result<Booking> {
        let booking = self.store.get(booking_id).await?;
        let now = self.now();
        let decision = policy::evaluate(&booking, &booking.cancellation_policy, now);
        let transition = transitions::cancel(&booking, reason, &decision, now)?;

        // Winning the status change makes this call the only one that
        // carries out the refund and release.
        let cancelled = self.commit(&booking, transition.booking).await?;
        let cancelled = self.apply_intents(cancelled, &transition.intents).await;

        metrics::counter!("booking_cancellations_total", "from" => booking.status.as_str())
            .increment(1);
        tracing::info!(
            confirmation_number = %cancelled.confirmation_number,
            refund = %cancelled.payment.refund_amount,
            "booking cancelled"
        );
        Ok(cancelled)
    }

    /// Marks a confirmed booking completed once its end date has passed.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, booking_id: BookingId) -> Result<Booking> {
        let booking = self.store.get(booking_id).await?;
        let transition = transitions::complete(&booking, self.now())?;
        Ok(self.commit(&booking, transition.booking).await?)
    }

    /// Previews the cancellation policy for a booking without changing it.
    pub async fn evaluate_cancellation(&self, booking_id: BookingId) -> Result<CancellationDecision> {
        let booking = self.store.get(booking_id).await?;
        Ok(policy::evaluate(
            &booking,
            &booking.cancellation_policy,
            self.now(),
        ))
    }

    /// Asks the payment service for the status of the booking's transaction.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_payment(&self, booking_id: BookingId) -> Result<PaymentStatusReport> {
        let booking = self.store.get(booking_id).await?;
        let transaction_id = match &booking.payment.transaction_id {
            Some(tx) if !booking.has_step(timeline::PAYMENT_SKIPPED) => tx.clone(),
            _ => return Err(BookingError::NoTransaction(booking_id)),
        };

        let report = bounded(
            self.config.timeouts.status,
            self.payments.status(&transaction_id),
            || PaymentClientError::Unavailable("status request timed out".to_string()),
        )
        .await?;

        if report.status != booking.payment.status.as_str() {
            tracing::warn!(
                %transaction_id,
                local = %booking.payment.status,
                remote = %report.status,
                "payment status mismatch"
            );
        }
        Ok(report)
    }

    pub async fn get(&self, booking_id: BookingId) -> Result<Booking> {
        Ok(self.store.get(booking_id).await?)
    }

    pub async fn get_by_confirmation_number(&self, code: &str) -> Result<Booking> {
        self.store
            .find_by_confirmation_number(code)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("confirmation number {code}")))
    }

    /// Periodic housekeeping: fails reserved bookings whose hold or slot
    /// claim lapsed and completes confirmed bookings whose end date has passed.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.now();
        let mut report = SweepReport::default();

        for booking in self.store.list_by_status(BookingStatus::Reserved).await? {
            if !booking.reservation.is_expired(now) {
                continue;
            }
            let transition = match transitions::expire_hold(&booking, now) {
                Ok(transition) => transition,
                Err(_) => continue,
            };
            match self.commit(&booking, transition.booking).await {
                Ok(failed) => {
                    self.apply_intents(failed, &transition.intents).await;
                    report.expired_holds += 1;
                }
                Err(err) => {
                    tracing::warn!(booking_id = %booking.booking_id, error = %err, "could not expire hold");
                    report.errors += 1;
                }
            }
        }

        for booking in self.store.list_by_status(BookingStatus::Confirmed).await? {
            if !booking.date_range.has_ended(now) {
                continue;
            }
            let result = match transitions::complete(&booking, now) {
                Ok(transition) => self.commit(&booking, transition.booking).await,
                Err(err) => Err(err.into()),
            };
            match result {
                Ok(_) => report.completed += 1,
                Err(err) => {
                    tracing::warn!(booking_id = %booking.booking_id, error = %err, "could not complete booking");
                    report.errors += 1;
                }
            }
        }

        metrics::counter!("booking_sweep_expired_total").increment(report.expired_holds as u64);
        metrics::counter!("booking_sweep_completed_total").increment(report.completed as u64);
        tracing::info!(
            expired_holds = report.expired_holds,
            completed = report.completed,
            errors = report.errors,
            "sweep finished"
        );
        Ok(report)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn claim_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.claim_timeout)
            .ok()
            .and_then(|timeout| now.checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn executor(&self) -> IntentExecutor<'_, H, P, M> {
        IntentExecutor::new(
            &self.holds,
            &self.payments,
            &self.provider,
            self.config.timeouts,
        )
    }

    async fn create_pending(&self, request: BookingRequest) -> Result<Booking> {
        let new = request.validate(&self.config.default_currency)?;
        let booking = Booking::create(new, self.now());

        tracing::info!(step = steps::STEP_CHECK_AVAILABILITY, "saga step started");
        self.ensure_available(&booking).await?;

        let booking = self.store.create(booking).await?;
        tracing::info!(
            booking_id = %booking.booking_id,
            confirmation_number = %booking.confirmation_number,
            "booking created"
        );
        Ok(booking)
    }

    async fn run_saga(&self, booking: Booking) -> Result<Booking> {
        tracing::info!(step = steps::STEP_CREATE_HOLD, "saga step started");
        let grant = match self.acquire_hold(&booking).await {
            Ok(grant) => grant,
            Err(err) => return Err(self.abort(booking, steps::STEP_CREATE_HOLD, err).await),
        };
        let held = match self.record_hold(&booking, &grant).await {
            Ok(held) => held,
            Err(err) => {
                self.release_hold(&grant.hold_id, "booking changed while holding").await;
                return Err(err);
            }
        };

        tracing::info!(step = steps::STEP_CLAIM_SLOT, "saga step started");
        let now = self.now();
        let claim = match transitions::claim_slot(&held, self.claim_deadline(now), now) {
            Ok(claim) => claim,
            Err(err) => return Err(self.abort(held, steps::STEP_CLAIM_SLOT, err.into()).await),
        };
        let reserved = match self.commit_guarded(&held, claim.booking).await {
            Ok(reserved) => reserved,
            Err(err) => {
                self.note_conflict(&err);
                return Err(self.abort(held, steps::STEP_CLAIM_SLOT, err).await);
            }
        };

        self.settle_and_confirm(reserved).await
    }

    /// Charge, confirm the hold, finalize, then provider side effects.
    async fn settle_and_confirm(&self, reserved: Booking) -> Result<Booking> {
        tracing::info!(step = steps::STEP_CHARGE_PAYMENT, "saga step started");
        let (mut reserved, settlement) = if self.skips_payment(&reserved) {
            let reference = format!("BYPASS-{}", reserved.confirmation_number);
            (reserved, Settlement::Bypassed { reference })
        } else {
            let receipt = match self.charge(&reserved).await {
                Ok(receipt) => receipt,
                Err(err) => {
                    return Err(self.abort(reserved, steps::STEP_CHARGE_PAYMENT, err).await);
                }
            };
            let charged = self.record_charge(&reserved, &receipt).await?;
            (charged, Settlement::Charged(receipt))
        };

        tracing::info!(step = steps::STEP_CONFIRM_HOLD, "saga step started");
        let confirmation = match self.confirm_hold(&mut reserved).await {
            Ok(confirmation) => confirmation,
            Err(err) => return Err(self.abort(reserved, steps::STEP_CONFIRM_HOLD, err).await),
        };

        tracing::info!(step = steps::STEP_FINALIZE, "saga step started");
        let transition = match transitions::confirm(
            &reserved,
            confirmation.as_deref(),
            &settlement,
            self.now(),
        ) {
            Ok(transition) => transition,
            Err(err) => return Err(self.abort(reserved, steps::STEP_FINALIZE, err.into()).await),
        };
        let confirmed = match self.commit(&reserved, transition.booking).await {
            Ok(confirmed) => confirmed,
            // Someone else moved the booking on; they own its cleanup.
            Err(err @ BookingError::StateConflict { .. }) => return Err(err),
            Err(err) => return Err(self.abort(reserved, steps::STEP_FINALIZE, err).await),
        };

        tracing::info!(step = steps::STEP_PROVIDER_SIDE_EFFECTS, "saga step started");
        Ok(self.apply_intents(confirmed, &transition.intents).await)
    }

    async fn acquire_hold(&self, booking: &Booking) -> Result<HoldGrant> {
        let request = HoldRequest {
            service_type: booking.service_type,
            resource_id: booking.service_id.clone(),
            date_range: booking.date_range,
            quantity: booking.quantity,
            owner_ref: booking.booking_id.to_string(),
        };
        let grant = bounded(
            self.config.timeouts.hold,
            self.holds.create_hold(&request),
            || HoldError::Unavailable("hold request timed out".to_string()),
        )
        .await?;
        tracing::info!(hold_id = %grant.hold_id, expires_at = %grant.expires_at, "hold placed");
        Ok(grant)
    }

    async fn record_hold(&self, booking: &Booking, grant: &HoldGrant) -> Result<Booking> {
        let transition = transitions::record_hold(booking, grant, self.now())?;
        self.commit(booking, transition.booking).await
    }

    /// Confirms the booking's hold, re-acquiring it if it lapsed.
    ///
    /// An expired hold is never re-confirmed. Returns `None` when the
    /// booking carries no hold.
    async fn confirm_hold(&self, booking: &mut Booking) -> Result<Option<String>> {
        let mut restarts = 0;
        loop {
            let hold_id = match transitions::usable_hold(booking, self.now()) {
                Ok(None) => return Ok(None),
                Ok(Some(hold_id)) => hold_id.to_string(),
                Err(TransitionError::HoldExpired { hold_id, .. }) => {
                    self.restart_hold(booking, &hold_id, &mut restarts).await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let owner_ref = booking.booking_id.to_string();
            let result = bounded(
                self.config.timeouts.hold,
                self.holds.confirm_hold(&hold_id, &owner_ref),
                || HoldError::Unavailable("hold confirmation timed out".to_string()),
            )
            .await;
            match result {
                Ok(confirmation_id) => return Ok(Some(confirmation_id)),
                Err(HoldError::Expired { .. }) => {
                    self.restart_hold(booking, &hold_id, &mut restarts).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn restart_hold(
        &self,
        booking: &mut Booking,
        expired_hold: &str,
        restarts: &mut u32,
    ) -> Result<()> {
        if *restarts >= self.config.max_hold_restarts {
            return Err(BookingError::HoldExpired {
                hold_id: expired_hold.to_string(),
            });
        }
        *restarts += 1;
        metrics::counter!("booking_hold_restarts_total").increment(1);
        tracing::warn!(hold_id = expired_hold, attempt = *restarts, "hold expired, re-acquiring");

        let grant = self.acquire_hold(booking).await?;
        match self.record_hold(booking, &grant).await {
            Ok(held) => {
                *booking = held;
                self.release_hold(expired_hold, "hold replaced").await;
                Ok(())
            }
            Err(err) => {
                self.release_hold(&grant.hold_id, "booking changed while holding").await;
                Err(err)
            }
        }
    }

    async fn charge(&self, booking: &Booking) -> Result<ChargeReceipt> {
        let request = ChargeRequest {
            amount: booking.total_amount,
            currency: booking.currency.clone(),
            method: booking.payment.method,
            customer_ref: booking.user_id.clone(),
            booking_ref: booking.booking_id.to_string(),
            description: format!(
                "{} booking {}",
                booking.service_type, booking.confirmation_number
            ),
        };
        let outcome = bounded(
            self.config.timeouts.payment,
            self.payments.charge(&request),
            || PaymentClientError::Unavailable("payment request timed out".to_string()),
        )
        .await?;

        match outcome {
            ChargeOutcome::Approved {
                transaction_id,
                processing_fee,
            } => {
                tracing::info!(%transaction_id, "payment charged");
                Ok(ChargeReceipt {
                    transaction_id,
                    processing_fee: processing_fee.or_else(|| self.processing_fee(booking)),
                    method: booking.payment.method,
                })
            }
            ChargeOutcome::Declined { code } => Err(BookingError::PaymentDeclined { code }),
        }
    }

    /// Stores the charge on the booking; refunds it if that is impossible.
    ///
    /// Unless another writer moved the booking on, the booking is then
    /// failed so its dates and hold are given back.
    async fn record_charge(&self, reserved: &Booking, receipt: &ChargeReceipt) -> Result<Booking> {
        let result = match transitions::record_charge(reserved, receipt, self.now()) {
            Ok(transition) => self.commit(reserved, transition.booking).await,
            Err(err) => Err(err.into()),
        };
        let err = match result {
            Ok(charged) => return Ok(charged),
            Err(err) => err,
        };

        let refund = Intent::Refund {
            transaction_id: receipt.transaction_id.clone(),
            amount: reserved.total_amount,
            reason: "booking changed during payment".to_string(),
        };
        self.executor().execute(&[refund]).await;

        match err {
            BookingError::StateConflict { .. } => Err(err),
            err => Err(self
                .abort(reserved.clone(), steps::STEP_RECORD_CHARGE, err)
                .await),
        }
    }

    fn processing_fee(&self, booking: &Booking) -> Option<Money> {
        (self.config.processing_fee_bps > 0)
            .then(|| booking.total_amount.apply_bps(self.config.processing_fee_bps))
    }

    fn skips_payment(&self, booking: &Booking) -> bool {
        self.config.payment_mode == PaymentMode::Bypass || booking.total_amount.is_zero()
    }

    /// Marks the booking failed, runs its compensations and hands back `err`.
    ///
    /// Compensation failures are recorded on the timeline but never replace
    /// the original error.
    async fn abort(&self, booking: Booking, step: &'static str, err: BookingError) -> BookingError {
        let now = self.now();
        let reason = err.to_string();
        let transition = if step == steps::STEP_CHARGE_PAYMENT {
            transitions::mark_payment_failed(&booking, err.error_code(), &reason, now)
        } else {
            transitions::fail(&booking, step, &reason, now)
        };

        match transition {
            Ok(transition) => match self.commit(&booking, transition.booking).await {
                Ok(failed) => {
                    self.apply_intents(failed, &transition.intents).await;
                }
                Err(commit_err) => tracing::error!(
                    booking_id = %booking.booking_id,
                    error = %commit_err,
                    "could not record saga failure"
                ),
            },
            Err(transition_err) => tracing::error!(
                booking_id = %booking.booking_id,
                error = %transition_err,
                "saga failure not recorded"
            ),
        }

        metrics::counter!("booking_saga_failed_total", "step" => step).increment(1);
        tracing::warn!(booking_id = %booking.booking_id, step, %reason, "saga failed");
        err
    }

    /// Puts a booking that lost its dates back to `pending`.
    async fn revert_on_conflict(&self, booking: Booking, err: BookingError) -> BookingError {
        let BookingError::Conflict { conflicting } = &err else {
            return err;
        };
        match transitions::revert_to_pending(&booking, conflicting, self.now()) {
            Ok(transition) => {
                if let Err(revert_err) = self.commit(&booking, transition.booking).await {
                    tracing::warn!(error = %revert_err, "could not revert booking to pending");
                }
            }
            Err(transition_err) => {
                tracing::warn!(error = %transition_err, "booking cannot be reverted");
            }
        }
        err
    }

    /// Executes intents and folds refund/release outcomes into the booking.
    async fn apply_intents(&self, committed: Booking, intents: &[Intent]) -> Booking {
        if intents.is_empty() {
            return committed;
        }
        let outcomes = self.executor().execute(intents).await;
        if !outcomes.iter().any(affects_booking) {
            return committed;
        }

        let recorded = transitions::record_compensation(&committed, &outcomes, self.now());
        match self.commit(&committed, recorded.booking).await {
            Ok(booking) => booking,
            Err(err) => {
                tracing::warn!(
                    booking_id = %committed.booking_id,
                    error = %err,
                    "could not record intent outcomes"
                );
                committed
            }
        }
    }

    async fn release_hold(&self, hold_id: &str, reason: &str) {
        let intent = Intent::CancelHold {
            hold_id: hold_id.to_string(),
            reason: reason.to_string(),
        };
        self.executor().execute(&[intent]).await;
    }

    async fn ensure_available(&self, booking: &Booking) -> Result<()> {
        let statuses = self.active_statuses(booking);
        let conflict = self
            .availability
            .find_conflict(
                &booking.provider_id,
                &booking.date_range,
                &statuses,
                Some(booking.booking_id),
            )
            .await?;
        match conflict {
            Some(conflicting) => {
                let err = BookingError::Conflict {
                    conflicting: Box::new(conflicting),
                };
                self.note_conflict(&err);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn note_conflict(&self, err: &BookingError) {
        if let BookingError::Conflict { conflicting } = err {
            metrics::counter!("booking_conflicts_total").increment(1);
            tracing::info!(
                conflicting = %conflicting.booking_id,
                range = %conflicting.date_range,
                "date range conflict"
            );
        }
    }

    fn active_statuses(&self, booking: &Booking) -> Vec<BookingStatus> {
        active_statuses(booking.service_type, self.config.lock_in_approved_guides)
    }

    async fn commit(&self, current: &Booking, next: Booking) -> Result<Booking> {
        Ok(self
            .store
            .update_status(next, UpdateOptions::expect(current))
            .await?)
    }

    async fn commit_guarded(&self, current: &Booking, next: Booking) -> Result<Booking> {
        let guard = SlotGuard::for_booking(current, self.active_statuses(current));
        Ok(self
            .store
            .update_status(next, UpdateOptions::expect(current).with_guard(guard))
            .await?)
    }
}

fn affects_booking(outcome: &IntentOutcome) -> bool {
    matches!(
        outcome.intent,
        Intent::CancelHold { .. } | Intent::Refund { .. }
    )
}
