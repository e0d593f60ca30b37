//! # Fleet Booking
//!
//! Reservation engine for rentable fleet assets: checks whether an asset is
//! free for a time window, prices the rental and tracks each booking through
//! `pending -> confirmed -> completed` (or `cancelled`).
//!
//! ## Architecture
//!
//! - **domain**: bookings, the status state machine, store and asset ports
//! - **application**: availability, pricing and the booking lifecycle service
//! - **infrastructure**: SeaORM and in-memory stores, static asset rates
//! - **interfaces**: REST API with Swagger documentation
//! - **shared**: errors, deadlines, retries and shutdown plumbing

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{init_database, DatabaseConfig, InMemoryBookingRepository, SeaOrmBookingRepository};

pub use interfaces::http::create_api_router;
