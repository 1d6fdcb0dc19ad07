//! Provider-metrics client: booking counters and guide calendar blocks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{DateRange, ProviderId};

use crate::error::ProviderMetricsError;

/// Side effects on the provider's own records.
///
/// Calls are best-effort from the orchestrator's point of view: a failure
/// is logged and never undoes a confirmed booking.
#[async_trait]
pub trait ProviderMetricsClient: Send + Sync {
    /// Adds `delta` to the booking count of `resource/id`.
    async fn adjust_booking_count(
        &self,
        resource: &str,
        id: &str,
        delta: i64,
    ) -> Result<(), ProviderMetricsError>;

    /// Marks the provider unavailable for `range`.
    async fn block_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError>;

    /// Lifts a block placed by [`Self::block_availability`].
    async fn unblock_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError>;
}

#[async_trait]
impl<T: ProviderMetricsClient + ?Sized> ProviderMetricsClient for Arc<T> {
    async fn adjust_booking_count(
        &self,
        resource: &str,
        id: &str,
        delta: i64,
    ) -> Result<(), ProviderMetricsError> {
        (**self).adjust_booking_count(resource, id, delta).await
    }

    async fn block_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError> {
        (**self).block_availability(provider_id, range).await
    }

    async fn unblock_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError> {
        (**self).unblock_availability(provider_id, range).await
    }
}

#[derive(Debug, Default)]
struct InMemoryProviderState {
    counts: HashMap<(String, String), i64>,
    blocks: HashSet<(ProviderId, DateRange)>,
    fail_all: bool,
}

/// In-memory provider-metrics service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderMetrics {
    state: Arc<RwLock<InMemoryProviderState>>,
}

impl InMemoryProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryProviderState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryProviderState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Configures every call to fail.
    pub fn set_fail_all(&self, fail: bool) {
        self.write().fail_all = fail;
    }

    /// Current booking count of `resource/id`.
    pub fn booking_count(&self, resource: &str, id: &str) -> i64 {
        self.read()
            .counts
            .get(&(resource.to_string(), id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_blocked(&self, provider_id: &ProviderId, range: &DateRange) -> bool {
        self.read()
            .blocks
            .contains(&(provider_id.clone(), *range))
    }
}

#[async_trait]
impl ProviderMetricsClient for InMemoryProviderMetrics {
    async fn adjust_booking_count(
        &self,
        resource: &str,
        id: &str,
        delta: i64,
    ) -> Result<(), ProviderMetricsError> {
        let mut state = self.write();
        if state.fail_all {
            return Err(ProviderMetricsError::Unavailable(
                "provider service down".to_string(),
            ));
        }
        *state
            .counts
            .entry((resource.to_string(), id.to_string()))
            .or_insert(0) += delta;
        Ok(())
    }

    async fn block_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError> {
        let mut state = self.write();
        if state.fail_all {
            return Err(ProviderMetricsError::Unavailable(
                "provider service down".to_string(),
            ));
        }
        state.blocks.insert((provider_id.clone(), *range));
        Ok(())
    }

    async fn unblock_availability(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
    ) -> Result<(), ProviderMetricsError> {
        let mut state = self.write();
        if state.fail_all {
            return Err(ProviderMetricsError::Unavailable(
                "provider service down".to_string(),
            ));
        }
        state.blocks.remove(&(provider_id.clone(), *range));
        Ok(())
    }
}
