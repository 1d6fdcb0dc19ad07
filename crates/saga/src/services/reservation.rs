//! Reservation hold client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::{DateRange, HoldGrant, HoldStatus, ServiceType};
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::error::HoldError;

/// Lifetime of an unconfirmed hold.
pub const HOLD_LIFETIME_MINUTES: i64 = 15;

/// What to hold with the reservation service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    pub service_type: ServiceType,
    pub resource_id: String,
    pub date_range: DateRange,
    pub quantity: u32,
    /// Correlates the hold with the booking that owns it.
    pub owner_ref: String,
}

/// Time-bounded holds against a downstream inventory service.
#[async_trait]
pub trait ReservationHoldClient: Send + Sync {
    /// Places a hold that lapses at the returned `expires_at`.
    async fn create_hold(&self, request: &HoldRequest) -> Result<HoldGrant, HoldError>;

    /// Confirms a hold, returning the service's confirmation ID.
    ///
    /// Fails with [`HoldError::Expired`] after `expires_at` and with
    /// [`HoldError::NotFound`] if the hold was cancelled.
    async fn confirm_hold(&self, hold_id: &str, owner_ref: &str) -> Result<String, HoldError>;

    /// Releases a hold. Releasing a hold that is already gone succeeds.
    async fn cancel_hold(&self, hold_id: &str, reason: &str) -> Result<(), HoldError>;
}

#[async_trait]
impl<T: ReservationHoldClient + ?Sized> ReservationHoldClient for Arc<T> {
    async fn create_hold(&self, request: &HoldRequest) -> Result<HoldGrant, HoldError> {
        (**self).create_hold(request).await
    }

    async fn confirm_hold(&self, hold_id: &str, owner_ref: &str) -> Result<String, HoldError> {
        (**self).confirm_hold(hold_id, owner_ref).await
    }

    async fn cancel_hold(&self, hold_id: &str, reason: &str) -> Result<(), HoldError> {
        (**self).cancel_hold(hold_id, reason).await
    }
}

#[derive(Debug, Clone)]
struct HoldRecord {
    owner_ref: String,
    status: HoldStatus,
    expires_at: DateTime<Utc>,
    confirmation_id: Option<String>,
}

#[derive(Debug, Default)]
struct InMemoryHoldState {
    holds: HashMap<String, HoldRecord>,
    next_id: u32,
    cancel_calls: usize,
    no_capacity: bool,
    unavailable: bool,
    fail_on_confirm: bool,
    fail_on_cancel: bool,
}

/// In-memory reservation service for testing.
///
/// Unconfirmed holds lapse [`HOLD_LIFETIME_MINUTES`] after creation,
/// measured on the injected clock.
#[derive(Debug, Clone)]
pub struct InMemoryHoldService {
    state: Arc<RwLock<InMemoryHoldState>>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl Default for InMemoryHoldService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHoldService {
    /// Creates a new in-memory hold service on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::default(),
            clock,
            lifetime: Duration::minutes(HOLD_LIFETIME_MINUTES),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryHoldState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryHoldState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `create_hold` report that nothing is left to hold.
    pub fn set_no_capacity(&self, no_capacity: bool) {
        self.write().no_capacity = no_capacity;
    }

    /// Makes every call fail as if the service could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.write().unavailable = unavailable;
    }

    pub fn set_fail_on_confirm(&self, fail: bool) {
        self.write().fail_on_confirm = fail;
    }

    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.write().fail_on_cancel = fail;
    }

    /// Current status of a hold as seen at the clock's current time.
    pub fn hold_status(&self, hold_id: &str) -> Option<HoldStatus> {
        let now = self.clock.now();
        self.read().holds.get(hold_id).map(|hold| match hold.status {
            HoldStatus::Pending if now >= hold.expires_at => HoldStatus::Expired,
            status => status,
        })
    }

    /// Total number of holds ever placed.
    pub fn hold_count(&self) -> usize {
        self.read().holds.len()
    }

    /// Number of holds that are pending or confirmed right now.
    pub fn active_hold_count(&self) -> usize {
        let ids: Vec<String> = self.read().holds.keys().cloned().collect();
        ids.iter()
            .filter(|id| {
                matches!(
                    self.hold_status(id),
                    Some(HoldStatus::Pending | HoldStatus::Confirmed)
                )
            })
            .count()
    }

    /// Number of `cancel_hold` calls received, including repeats.
    pub fn cancel_calls(&self) -> usize {
        self.read().cancel_calls
    }
}

#[async_trait]
impl ReservationHoldClient for InMemoryHoldService {
    async fn create_hold(&self, request: &HoldRequest) -> Result<HoldGrant, HoldError> {
        let now = self.clock.now();
        let mut state = self.write();

        if state.unavailable {
            return Err(HoldError::Unavailable("connection refused".to_string()));
        }
        if state.no_capacity {
            return Err(HoldError::ResourceUnavailable(format!(
                "{} {} has no capacity for {}",
                request.service_type, request.resource_id, request.date_range
            )));
        }

        state.next_id += 1;
        let hold_id = format!("HOLD-{:04}", state.next_id);
        let expires_at = now + self.lifetime;
        state.holds.insert(
            hold_id.clone(),
            HoldRecord {
                owner_ref: request.owner_ref.clone(),
                status: HoldStatus::Pending,
                expires_at,
                confirmation_id: None,
            },
        );

        Ok(HoldGrant {
            hold_id,
            expires_at,
        })
    }

    async fn confirm_hold(&self, hold_id: &str, owner_ref: &str) -> Result<String, HoldError> {
        let now = self.clock.now();
        let mut state = self.write();

        if state.unavailable || state.fail_on_confirm {
            return Err(HoldError::Unavailable("confirmation timed out".to_string()));
        }

        let hold = state
            .holds
            .get_mut(hold_id)
            .filter(|hold| hold.owner_ref == owner_ref)
            .ok_or_else(|| HoldError::NotFound {
                hold_id: hold_id.to_string(),
            })?;

        match hold.status {
            HoldStatus::Confirmed => Ok(hold.confirmation_id.clone().unwrap_or_default()),
            HoldStatus::Cancelled => Err(HoldError::NotFound {
                hold_id: hold_id.to_string(),
            }),
            HoldStatus::Expired => Err(HoldError::Expired {
                hold_id: hold_id.to_string(),
            }),
            HoldStatus::Pending if now >= hold.expires_at => {
                hold.status = HoldStatus::Expired;
                Err(HoldError::Expired {
                    hold_id: hold_id.to_string(),
                })
            }
            HoldStatus::Pending => {
                let confirmation_id = format!("CONF-{}", hold_id.trim_start_matches("HOLD-"));
                hold.status = HoldStatus::Confirmed;
                hold.confirmation_id = Some(confirmation_id.clone());
                Ok(confirmation_id)
            }
        }
    }

    async fn cancel_hold(&self, hold_id: &str, _reason: &str) -> Result<(), HoldError> {
        let now = self.clock.now();
        let mut state = self.write();
        state.cancel_calls += 1;

        if state.unavailable || state.fail_on_cancel {
            return Err(HoldError::Unavailable("connection reset".to_string()));
        }

        if let Some(hold) = state.holds.get_mut(hold_id)
            && (hold.status == HoldStatus::Confirmed || now < hold.expires_at)
        {
            hold.status = HoldStatus::Cancelled;
        }
        Ok(())
    }
}
