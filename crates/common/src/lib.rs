//! Shared types for the booking saga workspace.

mod types;

pub use types::{BookingId, Version};
