use common::{BookingId, Version};
use domain::{BookingStatus, ConflictingBooking};
use thiserror::Error;

/// Errors that can occur when interacting with the booking store.
#[derive(Debug, Error)]
pub enum BookingStoreError {
    /// No booking with the given ID exists.
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    /// The stored status did not match the expected prior status.
    #[error("Status conflict for booking {booking_id}: expected {expected}, found {actual}")]
    StatusConflict {
        booking_id: BookingId,
        expected: BookingStatus,
        actual: BookingStatus,
    },

    /// The stored version did not match the expected version.
    #[error("Concurrency conflict for booking {booking_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        booking_id: BookingId,
        expected: Version,
        actual: Version,
    },

    /// Another active booking of the same provider overlaps the guarded range.
    #[error("Date range already taken by booking {}", .conflicting.confirmation_number)]
    SlotTaken {
        booking_id: BookingId,
        conflicting: ConflictingBooking,
    },

    /// The booking is cancelled; its timeline is closed.
    #[error("Timeline of booking {0} is closed")]
    TimelineClosed(BookingId),

    /// A unique field is already used by another booking.
    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BookingStoreError {
    /// Returns true if the write lost a race against another writer.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BookingStoreError::StatusConflict { .. } | BookingStoreError::VersionConflict { .. }
        )
    }
}

/// Result type for booking store operations.
pub type Result<T> = std::result::Result<T, BookingStoreError>;
