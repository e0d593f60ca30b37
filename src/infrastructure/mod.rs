//! Infrastructure layer - external concerns

pub mod assets;
pub mod database;
pub mod storage;

pub use assets::StaticAssetDirectory;
pub use database::{init_database, DatabaseConfig, SeaOrmBookingRepository};
pub use storage::InMemoryBookingRepository;
