use async_trait::async_trait;
use common::{BookingId, Version};
use domain::{Booking, BookingStatus, DateRange, ProviderId, TimelineStep};

use crate::{BookingStoreError, Result};

/// Final, atomic availability check attached to a status update.
///
/// The write only succeeds if no other booking of `provider_id` in one of
/// `active_statuses` overlaps `range` at commit time.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGuard {
    pub provider_id: ProviderId,
    pub range: DateRange,
    pub active_statuses: Vec<BookingStatus>,
}

impl SlotGuard {
    /// Guards the booking's own provider and date range.
    pub fn for_booking(booking: &Booking, active_statuses: Vec<BookingStatus>) -> Self {
        Self {
            provider_id: booking.provider_id.clone(),
            range: booking.date_range,
            active_statuses,
        }
    }
}

/// Preconditions for a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOptions {
    /// Status the stored booking must currently be in.
    pub expected_status: BookingStatus,
    /// Version the stored booking must currently be at.
    pub expected_version: Version,
    pub slot_guard: Option<SlotGuard>,
}

impl UpdateOptions {
    /// Expects the stored booking to match `current` in status and version.
    pub fn expect(current: &Booking) -> Self {
        Self {
            expected_status: current.status,
            expected_version: current.version,
            slot_guard: None,
        }
    }

    /// Adds a slot guard to the update.
    pub fn with_guard(mut self, guard: SlotGuard) -> Self {
        self.slot_guard = Some(guard);
        self
    }
}

/// Core trait for booking store implementations.
///
/// There is no delete; terminal bookings are kept for audit.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a new booking at version 1.
    ///
    /// Fails with `Duplicate` if the booking ID, confirmation number or
    /// transaction ID is already in use.
    async fn create(&self, booking: Booking) -> Result<Booking>;

    /// Retrieves a booking by ID.
    async fn find_by_id(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Retrieves a booking by its confirmation number.
    async fn find_by_confirmation_number(&self, code: &str) -> Result<Option<Booking>>;

    /// Replaces the stored booking with `next` if the preconditions hold.
    ///
    /// The check and the write are atomic. On success the stored version is
    /// bumped and the stored booking is returned.
    async fn update_status(&self, next: Booking, options: UpdateOptions) -> Result<Booking>;

    /// Appends a step to the booking's timeline, bumping its version.
    ///
    /// Refused with `TimelineClosed` once the booking is cancelled.
    async fn append_timeline_step(
        &self,
        booking_id: BookingId,
        step: TimelineStep,
    ) -> Result<Booking>;

    /// Bookings of `provider_id` in one of `statuses` whose range overlaps `range`.
    async fn find_overlapping(
        &self,
        provider_id: &ProviderId,
        range: &DateRange,
        statuses: &[BookingStatus],
        exclude: Option<BookingId>,
    ) -> Result<Vec<Booking>>;

    /// All bookings currently in `status`, oldest first.
    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>>;
}

/// Extension trait providing convenience methods for booking stores.
#[async_trait]
pub trait BookingStoreExt: BookingStore {
    /// Retrieves a booking, failing with `NotFound` if it does not exist.
    async fn get(&self, booking_id: BookingId) -> Result<Booking> {
        self.find_by_id(booking_id)
            .await?
            .ok_or(BookingStoreError::NotFound(booking_id))
    }

    /// Checks if a booking exists.
    async fn exists(&self, booking_id: BookingId) -> Result<bool> {
        Ok(self.find_by_id(booking_id).await?.is_some())
    }
}

// Blanket implementation for all BookingStore implementations
impl<T: BookingStore + ?Sized> BookingStoreExt for T {}

/// Checks the preconditions of an update against the stored booking.
///
/// Shared by every implementation so they reject exactly the same writes.
pub(crate) fn check_update(
    stored: &Booking,
    next: &Booking,
    options: &UpdateOptions,
) -> Result<()> {
    let booking_id = stored.booking_id;
    if stored.status != options.expected_status {
        return Err(BookingStoreError::StatusConflict {
            booking_id,
            expected: options.expected_status,
            actual: stored.status,
        });
    }
    if stored.version != options.expected_version {
        return Err(BookingStoreError::VersionConflict {
            booking_id,
            expected: options.expected_version,
            actual: stored.version,
        });
    }
    if stored.status == BookingStatus::Cancelled && next.timeline.len() > stored.timeline.len() {
        return Err(BookingStoreError::TimelineClosed(booking_id));
    }
    Ok(())
}
