use async_trait::async_trait;
use domain::Money;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de};

use super::{describe, join};
use crate::error::PaymentClientError;
use crate::services::{
    ChargeOutcome, ChargeRequest, PaymentClient, PaymentErrorCode, PaymentStatusReport,
    RefundReceipt,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessPaymentBody<'a> {
    booking_reference: &'a str,
    customer_reference: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: &'a str,
    payment_method: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessPaymentResponse {
    success: bool,
    transaction_id: Option<String>,
    #[serde(default, deserialize_with = "reported_amount")]
    processing_fee: Option<Money>,
    error_code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefundBody<'a> {
    original_transaction_id: &'a str,
    /// `null` requests a full refund.
    #[serde(with = "rust_decimal::serde::float_option")]
    refund_amount: Option<Decimal>,
    reason: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundResponse {
    success: bool,
    refund_transaction_id: Option<String>,
    status: Option<String>,
    error_code: Option<String>,
}

/// Processor-reported amounts may carry floating point noise; they are
/// rounded to the cent.
fn reported_amount<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer)?
        .map(Money::rounded)
        .transpose()
        .map_err(de::Error::custom)
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

/// Payment service client: `POST /payments/process`, `POST /payments/refund`,
/// `GET /payments/{id}/status`.
#[derive(Debug, Clone)]
pub struct HttpPaymentClient {
    client: Client,
    base_url: String,
}

impl HttpPaymentClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn read<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> Result<T, PaymentClientError> {
        response
            .json()
            .await
            .map_err(|e| PaymentClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    #[tracing::instrument(skip(self, request), fields(booking_ref = %request.booking_ref))]
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, PaymentClientError> {
        let body = ProcessPaymentBody {
            booking_reference: &request.booking_ref,
            customer_reference: &request.customer_ref,
            amount: request.amount.as_decimal(),
            currency: request.currency.as_str(),
            payment_method: request.method.as_str(),
            description: &request.description,
        };
        let response = self
            .client
            .post(join(&self.base_url, "payments/process"))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentClientError::Unavailable(describe(&e)))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
            return Err(PaymentClientError::Unavailable(format!("HTTP {status}")));
        }

        // Declines may arrive with a 4xx status; the body carries the code.
        let body: ProcessPaymentResponse = Self::read(response).await?;
        match (body.success, body.transaction_id, body.error_code) {
            (true, Some(transaction_id), _) => Ok(ChargeOutcome::Approved {
                transaction_id,
                processing_fee: body.processing_fee,
            }),
            (true, None, _) => Err(PaymentClientError::InvalidResponse(
                "approved charge without transactionId".to_string(),
            )),
            (false, _, code) => Ok(ChargeOutcome::Declined {
                code: code
                    .as_deref()
                    .map(PaymentErrorCode::from_code)
                    .unwrap_or(PaymentErrorCode::Unknown),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn refund(
        &self,
        transaction_id: &str,
        amount: Option<Money>,
        reason: &str,
    ) -> Result<RefundReceipt, PaymentClientError> {
        let response = self
            .client
            .post(join(&self.base_url, "payments/refund"))
            .json(&RefundBody {
                original_transaction_id: transaction_id,
                refund_amount: amount.map(|a| a.as_decimal()),
                reason,
            })
            .send()
            .await
            .map_err(|e| PaymentClientError::Unavailable(describe(&e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(PaymentClientError::NotFound(transaction_id.to_string()));
            }
            status if status.is_server_error() => {
                return Err(PaymentClientError::Unavailable(format!("HTTP {status}")));
            }
            _ => {}
        }

        let body: RefundResponse = Self::read(response).await?;
        match (body.success, body.refund_transaction_id) {
            (true, Some(refund_id)) => Ok(RefundReceipt {
                refund_id,
                status: body.status.unwrap_or_else(|| "refunded".to_string()),
            }),
            (true, None) => Err(PaymentClientError::InvalidResponse(
                "refund without refundTransactionId".to_string(),
            )),
            (false, _) => Err(PaymentClientError::Rejected {
                code: body
                    .error_code
                    .as_deref()
                    .map(PaymentErrorCode::from_code)
                    .unwrap_or(PaymentErrorCode::Unknown),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn status(&self, transaction_id: &str) -> Result<PaymentStatusReport, PaymentClientError> {
        let response = self
            .client
            .get(join(&self.base_url, &format!("payments/{transaction_id}/status")))
            .send()
            .await
            .map_err(|e| PaymentClientError::Unavailable(describe(&e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(PaymentClientError::NotFound(transaction_id.to_string())),
            status if status.is_server_error() => {
                Err(PaymentClientError::Unavailable(format!("HTTP {status}")))
            }
            status if !status.is_success() => {
                Err(PaymentClientError::InvalidResponse(format!("HTTP {status}")))
            }
            _ => {
                let body: StatusResponse = Self::read(response).await?;
                Ok(PaymentStatusReport {
                    transaction_id: transaction_id.to_string(),
                    status: body.status,
                })
            }
        }
    }
}
