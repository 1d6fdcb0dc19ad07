//! Availability conflict checker.

use async_trait::async_trait;
use booking_store::{BookingStore, BookingStoreError};
use common::BookingId;
use domain::{BookingStatus, ConflictingBooking, DateRange, ProviderId, find_conflict};

/// Detects date-range overlap with a provider's existing bookings.
///
/// Ranges are half-open: a booking ending on the day another starts does
/// not conflict. Only bookings in `statuses` are considered.
#[async_trait]
pub trait AvailabilityChecker: Send + Sync {
    async fn find_conflict(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
        statuses: &[BookingStatus],
        exclude: Option<BookingId>,
    ) -> Result<Option<ConflictingBooking>, BookingStoreError>;

    async fn has_conflict(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
        statuses: &[BookingStatus],
        exclude: Option<BookingId>,
    ) -> Result<bool, BookingStoreError> {
        Ok(self
            .find_conflict(provider_id, range, statuses, exclude)
            .await?
            .is_some())
    }
}

/// Checks availability against the booking store.
#[derive(Debug, Clone)]
pub struct StoreAvailabilityChecker<S> {
    store: S,
}

impl<S: BookingStore> StoreAvailabilityChecker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: BookingStore> AvailabilityChecker for StoreAvailabilityChecker<S> {
    #[tracing::instrument(skip(self, provider_id, range, statuses), fields(provider_id = %provider_id, range = %range))]
    async fn find_conflict(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
        statuses: &[BookingStatus],
        exclude: Option<BookingId>,
    ) -> Result<Option<ConflictingBooking>, BookingStoreError> {
        let candidates = self
            .store
            .find_overlapping(provider_id, range, statuses, exclude)
            .await?;
        // Same half-open rule whichever store answered.
        let conflict = find_conflict(range, statuses, exclude, &candidates);
        if let Some(conflict) = &conflict {
            tracing::debug!(conflicting = %conflict.booking_id, "availability conflict");
        }
        Ok(conflict)
    }
}
