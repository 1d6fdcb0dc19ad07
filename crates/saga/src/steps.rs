//! Booking saga constants.

/// The saga type identifier for travel bookings.
pub const SAGA_TYPE: &str = "TravelBooking";

/// Step name: Check the provider's calendar for overlapping bookings.
pub const STEP_CHECK_AVAILABILITY: &str = "check_availability";

/// Step name: Place a time-bounded hold with the reservation service.
pub const STEP_CREATE_HOLD: &str = "create_hold";

/// Step name: Claim the date range on the booking record.
pub const STEP_CLAIM_SLOT: &str = "claim_slot";

/// Step name: Charge the customer.
pub const STEP_CHARGE_PAYMENT: &str = "charge_payment";

/// Step name: Store the charge on the booking.
pub const STEP_RECORD_CHARGE: &str = "record_charge";

/// Step name: Confirm the hold with the reservation service.
pub const STEP_CONFIRM_HOLD: &str = "confirm_hold";

/// Step name: Mark the booking confirmed.
pub const STEP_FINALIZE: &str = "finalize";

/// Step name: Provider counters and calendar blocks.
pub const STEP_PROVIDER_SIDE_EFFECTS: &str = "provider_side_effects";
