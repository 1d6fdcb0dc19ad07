use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{DateRange, ProviderId};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;

use super::{describe, join};
use crate::error::ProviderMetricsError;
use crate::services::ProviderMetricsClient;

#[derive(Serialize)]
struct BookingCountBody {
    increment: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockBody {
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

impl From<&DateRange> for BlockBody {
    fn from(range: &DateRange) -> Self {
        Self {
            start_date: range.start_date,
            end_date: range.end_date,
        }
    }
}

/// Provider-metrics client: `PATCH /{resource}/{id}/booking-count` and
/// `POST|DELETE /guide/{id}/availability/block`.
#[derive(Debug, Clone)]
pub struct HttpProviderMetricsClient {
    client: Client,
    base_url: String,
}

impl HttpProviderMetricsClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn send(request: RequestBuilder) -> Result<(), ProviderMetricsError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderMetricsError::Unavailable(describe(&e)))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() {
            Err(ProviderMetricsError::Unavailable(format!("HTTP {status}")))
        } else {
            Err(ProviderMetricsError::Rejected(format!("HTTP {status}")))
        }
    }

    fn block_url(&self, provider_id: &ProviderId) -> String {
        join(
            &self.base_url,
            &format!("guide/{provider_id}/availability/block"),
        )
    }
}

#[async_trait]
impl ProviderMetricsClient for HttpProviderMetricsClient {
    #[tracing::instrument(skip(self))]
    async fn adjust_booking_count(
        &self,
        resource: &str,
        id: &str,
        delta: i64,
    ) -> Result<(), ProviderMetricsError> {
        let url = join(&self.base_url, &format!("{resource}/{id}/booking-count"));
        Self::send(self.client.patch(url).json(&BookingCountBody { increment: delta })).await
    }

    #[tracing::instrument(skip(self, provider_id), fields(provider_id = %provider_id))]
    async fn block_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError> {
        let url = self.block_url(provider_id);
        Self::send(self.client.post(url).json(&BlockBody::from(range))).await
    }

    #[tracing::instrument(skip(self, provider_id), fields(provider_id = %provider_id))]
    async fn unblock_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError> {
        let url = self.block_url(provider_id);
        Self::send(self.client.delete(url).json(&BlockBody::from(range))).await
    }
}
