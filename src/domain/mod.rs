pub mod asset;
pub mod booking;

// Re-export commonly used types
pub use asset::AssetDirectory;
pub use booking::{Booking, BookingRepository, BookingStatus, Interval, NewBooking, StatusChange};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::{DomainError, DomainResult};
