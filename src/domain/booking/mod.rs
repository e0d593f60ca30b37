//! Booking aggregate
//!
//! Contains the Booking entity, its status state machine, and the
//! repository interface.

pub mod model;
pub mod repository;

pub use model::{Booking, BookingStatus, Interval, NewBooking};
pub use repository::{BookingRepository, StatusChange};
