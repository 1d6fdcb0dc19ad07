//! Payment client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Currency, Money, PaymentMethod};
use serde::Serialize;

use crate::error::PaymentClientError;

/// Structured decline codes reported by the payment processor.
///
/// Each code maps to exactly one customer-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentErrorCode {
    InsufficientFunds,
    CardDeclined,
    InvalidCard,
    ExpiredCard,
    InvalidCvv,
    ProcessingError,
    NetworkError,
    Timeout,
    DuplicateTransaction,
    AmountInvalid,
    CurrencyNotSupported,
    ServiceUnavailable,
    Unknown,
}

impl PaymentErrorCode {
    pub const ALL: [PaymentErrorCode; 13] = [
        PaymentErrorCode::InsufficientFunds,
        PaymentErrorCode::CardDeclined,
        PaymentErrorCode::InvalidCard,
        PaymentErrorCode::ExpiredCard,
        PaymentErrorCode::InvalidCvv,
        PaymentErrorCode::ProcessingError,
        PaymentErrorCode::NetworkError,
        PaymentErrorCode::Timeout,
        PaymentErrorCode::DuplicateTransaction,
        PaymentErrorCode::AmountInvalid,
        PaymentErrorCode::CurrencyNotSupported,
        PaymentErrorCode::ServiceUnavailable,
        PaymentErrorCode::Unknown,
    ];

    /// Parses a processor code. Anything unrecognised is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == code)
            .unwrap_or(PaymentErrorCode::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            PaymentErrorCode::CardDeclined => "CARD_DECLINED",
            PaymentErrorCode::InvalidCard => "INVALID_CARD",
            PaymentErrorCode::ExpiredCard => "EXPIRED_CARD",
            PaymentErrorCode::InvalidCvv => "INVALID_CVV",
            PaymentErrorCode::ProcessingError => "PROCESSING_ERROR",
            PaymentErrorCode::NetworkError => "NETWORK_ERROR",
            PaymentErrorCode::Timeout => "TIMEOUT",
            PaymentErrorCode::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            PaymentErrorCode::AmountInvalid => "AMOUNT_INVALID",
            PaymentErrorCode::CurrencyNotSupported => "CURRENCY_NOT_SUPPORTED",
            PaymentErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            PaymentErrorCode::Unknown => "UNKNOWN",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            PaymentErrorCode::InsufficientFunds => {
                "Payment declined due to insufficient funds. Please check your account balance."
            }
            PaymentErrorCode::CardDeclined => {
                "Your card was declined. Please contact your bank or use a different card."
            }
            PaymentErrorCode::InvalidCard => {
                "Invalid card information. Please check your card details and try again."
            }
            PaymentErrorCode::ExpiredCard => "Your card has expired. Please use a different card.",
            PaymentErrorCode::InvalidCvv => {
                "Invalid security code (CVV). Please check and try again."
            }
            PaymentErrorCode::ProcessingError => {
                "Payment processing error. Please try again or use a different payment method."
            }
            PaymentErrorCode::NetworkError => {
                "Network connection error. Please check your connection and try again."
            }
            PaymentErrorCode::Timeout => "Payment processing timed out. Please try again.",
            PaymentErrorCode::DuplicateTransaction => {
                "This transaction appears to be a duplicate. Please check your bookings."
            }
            PaymentErrorCode::AmountInvalid => "Invalid payment amount. Please contact support.",
            PaymentErrorCode::CurrencyNotSupported => {
                "Currency not supported. Please contact support."
            }
            PaymentErrorCode::ServiceUnavailable => {
                "Payment service is temporarily unavailable. Please try again later."
            }
            PaymentErrorCode::Unknown => "Payment processing failed. Please try again.",
        }
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A charge to submit to the processor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    pub amount: Money,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub customer_ref: String,
    pub booking_ref: String,
    pub description: String,
}

/// What the processor decided. A decline is an answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved {
        transaction_id: String,
        processing_fee: Option<Money>,
    },
    Declined {
        code: PaymentErrorCode,
    },
}

/// Acknowledgement of a refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub status: String,
}

/// Processor-side view of a transaction, used for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusReport {
    pub transaction_id: String,
    pub status: String,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Charges the customer. Declines come back as [`ChargeOutcome::Declined`].
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, PaymentClientError>;

    /// Refunds a transaction; `amount = None` refunds it in full.
    async fn refund(
        &self,
        transaction_id: &str,
        amount: Option<Money>,
        reason: &str,
    ) -> Result<RefundReceipt, PaymentClientError>;

    /// Looks up the processor's status for a transaction.
    async fn status(&self, transaction_id: &str) -> Result<PaymentStatusReport, PaymentClientError>;
}

#[async_trait]
impl<T: PaymentClient + ?Sized> PaymentClient for Arc<T> {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, PaymentClientError> {
        (**self).charge(request).await
    }

    async fn refund(
        &self,
        transaction_id: &str,
        amount: Option<Money>,
        reason: &str,
    ) -> Result<RefundReceipt, PaymentClientError> {
        (**self).refund(transaction_id, amount, reason).await
    }

    async fn status(&self, transaction_id: &str) -> Result<PaymentStatusReport, PaymentClientError> {
        (**self).status(transaction_id).await
    }
}

#[derive(Debug, Clone)]
struct PaymentRecord {
    amount: Money,
    refunded: Money,
}

impl PaymentRecord {
    fn status(&self) -> &'static str {
        if self.refunded.is_zero() {
            "completed"
        } else if self.refunded >= self.amount {
            "refunded"
        } else {
            "partially_refunded"
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<String, PaymentRecord>,
    next_id: u32,
    next_refund_id: u32,
    decline_with: Option<PaymentErrorCode>,
    unavailable: bool,
    fail_on_refund: bool,
}

/// In-memory payment processor for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Declines every charge with `code` until cleared with `None`.
    pub fn set_decline(&self, code: Option<PaymentErrorCode>) {
        self.write().decline_with = code;
    }

    /// Makes every call fail as if the processor could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write().fail_on_refund = fail;
    }

    /// Returns the number of successful charges.
    pub fn payment_count(&self) -> usize {
        self.read().payments.len()
    }

    /// Returns true if a charge exists with the given transaction ID.
    pub fn has_payment(&self, transaction_id: &str) -> bool {
        self.read().payments.contains_key(transaction_id)
    }

    /// Total refunded against a transaction.
    pub fn refunded_amount(&self, transaction_id: &str) -> Option<Money> {
        self.read().payments.get(transaction_id).map(|p| p.refunded)
    }
}

#[async_trait]
impl PaymentClient for InMemoryPaymentService {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, PaymentClientError> {
        let mut state = self.write();

        if state.unavailable {
            return Err(PaymentClientError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        if let Some(code) = state.decline_with {
            return Ok(ChargeOutcome::Declined { code });
        }

        state.next_id += 1;
        let transaction_id = format!("PAY-{:04}", state.next_id);
        state.payments.insert(
            transaction_id.clone(),
            PaymentRecord {
                amount: request.amount,
                refunded: Money::zero(),
            },
        );

        Ok(ChargeOutcome::Approved {
            transaction_id,
            processing_fee: None,
        })
    }

    async fn refund(
        &self,
        transaction_id: &str,
        amount: Option<Money>,
        _reason: &str,
    ) -> Result<RefundReceipt, PaymentClientError> {
        let mut state = self.write();

        if state.unavailable || state.fail_on_refund {
            return Err(PaymentClientError::Unavailable("refund timed out".to_string()));
        }

        let payment = state
            .payments
            .get_mut(transaction_id)
            .ok_or_else(|| PaymentClientError::NotFound(transaction_id.to_string()))?;
        let remaining = payment.amount - payment.refunded;
        let amount = amount.unwrap_or(remaining);
        if amount.is_negative() || amount > remaining {
            return Err(PaymentClientError::Rejected {
                code: PaymentErrorCode::AmountInvalid,
            });
        }
        payment.refunded = payment.refunded + amount;
        let status = payment.status().to_string();

        state.next_refund_id += 1;
        Ok(RefundReceipt {
            refund_id: format!("REF-{:04}", state.next_refund_id),
            status,
        })
    }

    async fn status(&self, transaction_id: &str) -> Result<PaymentStatusReport, PaymentClientError> {
        let state = self.read();
        if state.unavailable {
            return Err(PaymentClientError::Unavailable(
                "connection refused".to_string(),
            ));
        }
        state
            .payments
            .get(transaction_id)
            .map(|payment| PaymentStatusReport {
                transaction_id: transaction_id.to_string(),
                status: payment.status().to_string(),
            })
            .ok_or_else(|| PaymentClientError::NotFound(transaction_id.to_string()))
    }
}
