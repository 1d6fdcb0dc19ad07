//! Booking record store.
//!
//! The store is the only mutable shared resource of the booking orchestrator.
//! Every write is a single-document conditional update guarded by the
//! expected prior status and version.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{BookingStoreError, Result};
pub use memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;
pub use store::{BookingStore, BookingStoreExt, SlotGuard, UpdateOptions};
