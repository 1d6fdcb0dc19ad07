//! Date-range conflict rules.

use common::BookingId;
use serde::{Deserialize, Serialize};

use super::model::Booking;
use super::state::BookingStatus;
use super::value_objects::{ConfirmationNumber, DateRange, ServiceType};

/// An existing booking that occupies an overlapping range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingBooking {
    pub booking_id: BookingId,
    pub confirmation_number: ConfirmationNumber,
    pub status: BookingStatus,
    pub date_range: DateRange,
}

impl From<&Booking> for ConflictingBooking {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id,
            confirmation_number: booking.confirmation_number.clone(),
            status: booking.status,
            date_range: booking.date_range,
        }
    }
}

/// Statuses that occupy a provider's calendar.
///
/// `reserved` counts because a booking in that state is mid-payment and
/// holds its slot. Approved guide bookings lock the date when
/// `lock_in_approved_guides` is set.
pub fn active_statuses(service_type: ServiceType, lock_in_approved_guides: bool) -> Vec<BookingStatus> {
    let mut statuses = vec![BookingStatus::Reserved, BookingStatus::Confirmed];
    if service_type == ServiceType::Guide && lock_in_approved_guides {
        statuses.push(BookingStatus::Approved);
    }
    statuses
}

/// Finds the first booking among `existing` that blocks `range`.
///
/// Bookings outside `statuses` and the excluded booking are ignored.
pub fn find_conflict<'a>(
    range: &DateRange,
    statuses: &[BookingStatus],
    exclude: Option<BookingId>,
    existing: impl IntoIterator<Item = &'a Booking>,
) -> Option<ConflictingBooking> {
    existing
        .into_iter()
        .filter(|b| Some(b.booking_id) != exclude)
        .filter(|b| statuses.contains(&b.status))
        .find(|b| b.date_range.overlaps(range))
        .map(ConflictingBooking::from)
}
