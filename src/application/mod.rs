pub mod booking;

// Re-export key types for convenience
pub use booking::{AvailabilityChecker, BookingService, CreateBooking};
