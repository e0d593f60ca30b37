//! Booking use cases

pub mod availability;
pub mod pricing;
pub mod service;

pub use availability::AvailabilityChecker;
pub use pricing::compute_cost;
pub use service::{BookingService, CreateBooking};
