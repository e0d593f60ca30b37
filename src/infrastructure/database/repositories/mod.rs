//! Database repository implementations

pub mod booking_repository;

pub use booking_repository::SeaOrmBookingRepository;
