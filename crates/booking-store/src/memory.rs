use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::BookingId;
use domain::{Booking, BookingStatus, DateRange, ProviderId, TimelineStep, find_conflict};
use tokio::sync::RwLock;

use crate::{
    BookingStoreError, Result,
    store::{BookingStore, UpdateOptions, check_update},
};

/// In-memory booking store implementation for testing.
///
/// Every write holds the map's write lock for the whole check-and-replace,
/// which gives the same atomicity as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty in-memory booking store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of bookings stored.
    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

fn ensure_unique(
    bookings: &HashMap<BookingId, Booking>,
    candidate: &Booking,
) -> Result<()> {
    for other in bookings.values() {
        if other.booking_id == candidate.booking_id {
            continue;
        }
        if other.confirmation_number == candidate.confirmation_number {
            return Err(BookingStoreError::Duplicate {
                field: "confirmation_number",
                value: candidate.confirmation_number.to_string(),
            });
        }
        if let Some(tx) = &candidate.payment.transaction_id
            && other.payment.transaction_id.as_ref() == Some(tx)
        {
            return Err(BookingStoreError::Duplicate {
                field: "transaction_id",
                value: tx.clone(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, mut booking: Booking) -> Result<Booking> {
        let mut store = self.bookings.write().await;

        if store.contains_key(&booking.booking_id) {
            return Err(BookingStoreError::Duplicate {
                field: "booking_id",
                value: booking.booking_id.to_string(),
            });
        }
        ensure_unique(&store, &booking)?;

        booking.version = common::Version::first();
        store.insert(booking.booking_id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn find_by_confirmation_number(&self, code: &str) -> Result<Option<Booking>> {
        let store = self.bookings.read().await;
        Ok(store
            .values()
            .find(|b| b.confirmation_number.as_str() == code)
            .cloned())
    }

    async fn update_status(&self, mut next: Booking, options: UpdateOptions) -> Result<Booking> {
        let booking_id = next.booking_id;
        let mut store = self.bookings.write().await;

        let stored = store
            .get(&booking_id)
            .ok_or(BookingStoreError::NotFound(booking_id))?;
        check_update(stored, &next, &options)?;

        if let Some(guard) = &options.slot_guard {
            let same_provider = store
                .values()
                .filter(|b| b.provider_id == guard.provider_id);
            if let Some(conflicting) = find_conflict(
                &guard.range,
                &guard.active_statuses,
                Some(booking_id),
                same_provider,
            ) {
                return Err(BookingStoreError::SlotTaken {
                    booking_id,
                    conflicting,
                });
            }
        }

        ensure_unique(&store, &next)?;

        next.version = options.expected_version.next();
        store.insert(booking_id, next.clone());
        Ok(next)
    }

    async fn append_timeline_step(
        &self,
        booking_id: BookingId,
        step: TimelineStep,
    ) -> Result<Booking> {
        let mut store = self.bookings.write().await;
        let booking = store
            .get_mut(&booking_id)
            .ok_or(BookingStoreError::NotFound(booking_id))?;

        if booking.status == BookingStatus::Cancelled {
            return Err(BookingStoreError::TimelineClosed(booking_id));
        }

        booking.updated_at = step.timestamp;
        booking.timeline.push(step);
        booking.version = booking.version.next();
        Ok(booking.clone())
    }

    async fn find_overlapping(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
        statuses: &[BookingStatus],
        exclude: Option<BookingId>,
    ) -> Result<Vec<Booking>> {
        let store = self.bookings.read().await;
        let mut found: Vec<_> = store
            .values()
            .filter(|b| &b.provider_id == provider_id)
            .filter(|b| Some(b.booking_id) != exclude)
            .filter(|b| statuses.contains(&b.status))
            .filter(|b| b.date_range.overlaps(range))
            .cloned()
            .collect();
        found.sort_by_key(|b| b.date_range.start_date);
        Ok(found)
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let store = self.bookings.read().await;
        let mut found: Vec<_> = store
            .values()
            .filter(|b| b.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|b| b.created_at);
        Ok(found)
    }
}
