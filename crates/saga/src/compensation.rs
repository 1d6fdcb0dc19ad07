//! Best-effort execution of transition intents.
//!
//! Compensations and provider side effects never fail the caller: each
//! intent yields an [`IntentOutcome`] that is logged, counted and folded
//! back into the booking.

use std::future::Future;
use std::time::Duration;

use domain::{Intent, IntentOutcome};

use crate::config::Timeouts;
use crate::services::{PaymentClient, ProviderMetricsClient, ReservationHoldClient};

/// Runs `call`, failing with `on_timeout` if it takes longer than `limit`.
pub(crate) async fn bounded<T, E>(
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}

fn is_compensation(intent: &Intent) -> bool {
    !matches!(
        intent,
        Intent::IncrementProviderCounters { .. } | Intent::BlockProviderCalendar { .. }
    )
}

/// Executes intents against the remote collaborators.
pub struct IntentExecutor<'a, H, P, M> {
    holds: &'a H,
    payments: &'a P,
    provider: &'a M,
    timeouts: Timeouts,
}

impl<'a, H, P, M> IntentExecutor<'a, H, P, M>
where
    H: ReservationHoldClient,
    P: PaymentClient,
    M: ProviderMetricsClient,
{
    pub fn new(holds: &'a H, payments: &'a P, provider: &'a M, timeouts: Timeouts) -> Self {
        Self {
            holds,
            payments,
            provider,
            timeouts,
        }
    }

    /// Runs every intent in order. A failure does not stop later intents.
    pub async fn execute(&self, intents: &[Intent]) -> Vec<IntentOutcome> {
        let mut outcomes = Vec::with_capacity(intents.len());
        for intent in intents {
            let outcome = self.run(intent).await;
            let result = if outcome.succeeded { "success" } else { "failure" };
            let metric = if is_compensation(intent) {
                "booking_compensations_total"
            } else {
                "booking_side_effects_total"
            };
            metrics::counter!(metric, "action" => intent.action(), "outcome" => result)
                .increment(1);

            if outcome.succeeded {
                tracing::info!(action = intent.action(), "intent executed");
            } else {
                tracing::warn!(
                    action = intent.action(),
                    detail = outcome.detail.as_deref().unwrap_or_default(),
                    "intent failed"
                );
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run(&self, intent: &Intent) -> IntentOutcome {
        let result: Result<Option<String>, String> = match intent {
            Intent::CancelHold { hold_id, reason } => bounded(
                self.timeouts.hold,
                self.holds.cancel_hold(hold_id, reason),
                || crate::error::HoldError::Unavailable("cancel timed out".to_string()),
            )
            .await
            .map(|()| None)
            .map_err(|e| e.to_string()),

            Intent::Refund {
                transaction_id,
                amount,
                reason,
            } => bounded(
                self.timeouts.payment,
                self.payments.refund(transaction_id, Some(*amount), reason),
                || crate::error::PaymentClientError::Unavailable("refund timed out".to_string()),
            )
            .await
            .map(|receipt| Some(receipt.refund_id))
            .map_err(|e| e.to_string()),

            Intent::IncrementProviderCounters { targets }
            | Intent::DecrementProviderCounters { targets } => {
                let delta = if matches!(intent, Intent::IncrementProviderCounters { .. }) {
                    1
                } else {
                    -1
                };
                let mut failures = Vec::new();
                for target in targets {
                    if let Err(e) = bounded(
                        self.timeouts.provider_metrics,
                        self.provider
                            .adjust_booking_count(&target.resource, &target.id, delta),
                        || {
                            crate::error::ProviderMetricsError::Unavailable(
                                "booking count update timed out".to_string(),
                            )
                        },
                    )
                    .await
                    {
                        failures.push(format!("{}/{}: {e}", target.resource, target.id));
                    }
                }
                if failures.is_empty() {
                    Ok(None)
                } else {
                    Err(failures.join("; "))
                }
            }

            Intent::BlockProviderCalendar { provider_id, range } => bounded(
                self.timeouts.provider_metrics,
                self.provider.block_availability(provider_id, range),
                || {
                    crate::error::ProviderMetricsError::Unavailable(
                        "calendar block timed out".to_string(),
                    )
                },
            )
            .await
            .map(|()| None)
            .map_err(|e| e.to_string()),

            Intent::UnblockProviderCalendar { provider_id, range } => bounded(
                self.timeouts.provider_metrics,
                self.provider.unblock_availability(provider_id, range),
                || {
                    crate::error::ProviderMetricsError::Unavailable(
                        "calendar unblock timed out".to_string(),
                    )
                },
            )
            .await
            .map(|()| None)
            .map_err(|e| e.to_string()),
        };

        match result {
            Ok(reference) => IntentOutcome::succeeded(intent.clone(), reference),
            Err(detail) => IntentOutcome::failed(intent.clone(), detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        ChargeOutcome, ChargeRequest, HoldRequest, InMemoryHoldService, InMemoryPaymentService,
        InMemoryProviderMetrics,
    };
    use chrono::Utc;
    use domain::{CounterTarget, Currency, DateRange, Money, PaymentMethod, ServiceType};

    struct Fixture {
        holds: InMemoryHoldService,
        payments: InMemoryPaymentService,
        provider: InMemoryProviderMetrics,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                holds: InMemoryHoldService::new(),
                payments: InMemoryPaymentService::new(),
                provider: InMemoryProviderMetrics::new(),
            }
        }

        fn executor(
            &self,
        ) -> IntentExecutor<'_, InMemoryHoldService, InMemoryPaymentService, InMemoryProviderMetrics>
        {
            IntentExecutor::new(
                &self.holds,
                &self.payments,
                &self.provider,
                Timeouts::default(),
            )
        }

        async fn hold(&self) -> String {
            let now = Utc::now();
            self.holds
                .create_hold(&HoldRequest {
                    service_type: ServiceType::Accommodation,
                    resource_id: "hotel-1".into(),
                    date_range: DateRange::new(now, now + chrono::Duration::days(1)).unwrap(),
                    quantity: 1,
                    owner_ref: "b-1".into(),
                })
                .await
                .unwrap()
                .hold_id
        }

        async fn charge(&self) -> String {
            let outcome = self
                .payments
                .charge(&ChargeRequest {
                    amount: Money::from_major(100),
                    currency: Currency::default(),
                    method: PaymentMethod::Card,
                    customer_ref: "u".into(),
                    booking_ref: "b-1".into(),
                    description: "test".into(),
                })
                .await
                .unwrap();
            match outcome {
                ChargeOutcome::Approved { transaction_id, .. } => transaction_id,
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_intents() {
        let fixture = Fixture::new();
        let hold_id = fixture.hold().await;
        let transaction_id = fixture.charge().await;
        fixture.payments.set_fail_on_refund(true);

        let intents = vec![
            Intent::Refund {
                transaction_id: transaction_id.clone(),
                amount: Money::from_major(100),
                reason: "saga failed".into(),
            },
            Intent::CancelHold {
                hold_id: hold_id.clone(),
                reason: "saga failed".into(),
            },
        ];
        let outcomes = fixture.executor().execute(&intents).await;

        assert!(!outcomes[0].succeeded);
        assert!(outcomes[0].detail.is_some());
        assert!(outcomes[1].succeeded);
        assert_eq!(
            fixture.holds.hold_status(&hold_id),
            Some(domain::HoldStatus::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_refund_reference_is_recorded() {
        let fixture = Fixture::new();
        let transaction_id = fixture.charge().await;

        let outcomes = fixture
            .executor()
            .execute(&[Intent::Refund {
                transaction_id: transaction_id.clone(),
                amount: Money::from_major(100),
                reason: "cancelled".into(),
            }])
            .await;

        assert!(outcomes[0].succeeded);
        assert_eq!(outcomes[0].reference.as_deref(), Some("REF-0001"));
        assert_eq!(
            fixture.payments.refunded_amount(&transaction_id),
            Some(Money::from_major(100))
        );
    }

    #[tokio::test]
    async fn test_counters_move_both_ways() {
        let fixture = Fixture::new();
        let targets = vec![CounterTarget {
            resource: "guide".into(),
            id: "guide-1".into(),
        }];
        let executor = fixture.executor();

        executor
            .execute(&[Intent::IncrementProviderCounters {
                targets: targets.clone(),
            }])
            .await;
        assert_eq!(fixture.provider.booking_count("guide", "guide-1"), 1);

        executor
            .execute(&[Intent::DecrementProviderCounters { targets }])
            .await;
        assert_eq!(fixture.provider.booking_count("guide", "guide-1"), 0);
    }

    #[tokio::test]
    async fn test_bounded_reports_timeouts() {
        let result: Result<(), &str> = bounded(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            || "timed out",
        )
        .await;
        assert_eq!(result, Err("timed out"));
    }
}
