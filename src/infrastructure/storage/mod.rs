//! Non-persistent storage backends

pub mod memory;

pub use memory::InMemoryBookingRepository;
