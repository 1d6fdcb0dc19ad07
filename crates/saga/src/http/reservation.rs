use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::HoldGrant;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{describe, join};
use crate::error::HoldError;
use crate::services::{HoldRequest, ReservationHoldClient};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateHoldResponse {
    #[serde(default = "default_success")]
    success: bool,
    reservation_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmHoldResponse {
    confirmation_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnerBody<'a> {
    owner_ref: &'a str,
}

#[derive(Serialize)]
struct ReasonBody<'a> {
    reason: &'a str,
}

fn default_success() -> bool {
    true
}

/// Reservation service client: `POST /reservations`,
/// `POST /reservations/{id}/confirm`, `DELETE /reservations/{id}`.
#[derive(Debug, Clone)]
pub struct HttpHoldClient {
    client: Client,
    base_url: String,
}

impl HttpHoldClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReservationHoldClient for HttpHoldClient {
    #[tracing::instrument(skip(self, request), fields(resource_id = %request.resource_id))]
    async fn create_hold(&self, request: &HoldRequest) -> Result<HoldGrant, HoldError> {
        let response = self
            .client
            .post(join(&self.base_url, "reservations"))
            .json(request)
            .send()
            .await
            .map_err(|e| HoldError::Unavailable(describe(&e)))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(HoldError::ResourceUnavailable(format!(
                "{} is fully booked",
                request.resource_id
            )));
        }
        if status.is_server_error() {
            return Err(HoldError::Unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(HoldError::Rejected(format!("HTTP {status}")));
        }

        let body: CreateHoldResponse = response
            .json()
            .await
            .map_err(|e| HoldError::Rejected(e.to_string()))?;
        if !body.success {
            return Err(HoldError::ResourceUnavailable(
                body.message
                    .unwrap_or_else(|| format!("{} not available", request.resource_id)),
            ));
        }
        match (body.reservation_id, body.expires_at) {
            (Some(hold_id), Some(expires_at)) => Ok(HoldGrant {
                hold_id,
                expires_at,
            }),
            _ => Err(HoldError::Rejected(
                "response is missing reservationId or expiresAt".to_string(),
            )),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_hold(&self, hold_id: &str, owner_ref: &str) -> Result<String, HoldError> {
        let response = self
            .client
            .post(join(&self.base_url, &format!("reservations/{hold_id}/confirm")))
            .json(&OwnerBody { owner_ref })
            .send()
            .await
            .map_err(|e| HoldError::Unavailable(describe(&e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(HoldError::NotFound {
                hold_id: hold_id.to_string(),
            }),
            StatusCode::GONE => Err(HoldError::Expired {
                hold_id: hold_id.to_string(),
            }),
            status if status.is_server_error() => {
                Err(HoldError::Unavailable(format!("HTTP {status}")))
            }
            status if !status.is_success() => Err(HoldError::Rejected(format!("HTTP {status}"))),
            _ => {
                let body: ConfirmHoldResponse = response
                    .json()
                    .await
                    .map_err(|e| HoldError::Rejected(e.to_string()))?;
                Ok(body.confirmation_id.unwrap_or_else(|| hold_id.to_string()))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_hold(&self, hold_id: &str, reason: &str) -> Result<(), HoldError> {
        let response = self
            .client
            .delete(join(&self.base_url, &format!("reservations/{hold_id}")))
            .json(&ReasonBody { reason })
            .send()
            .await
            .map_err(|e| HoldError::Unavailable(describe(&e)))?;

        // Already gone counts as released.
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(()),
            status if status.is_server_error() => {
                Err(HoldError::Unavailable(format!("HTTP {status}")))
            }
            status => Err(HoldError::Rejected(format!("HTTP {status}"))),
        }
    }
}
