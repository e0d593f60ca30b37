//! Asset directory port
//!
//! The fleet catalogue is owned by another service; the booking engine only
//! needs the per-day rate of an asset.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::shared::errors::DomainResult;

#[async_trait]
pub trait AssetDirectory: Send + Sync {
    /// Price of renting `asset_id` for one day.
    async fn rate_per_day(&self, asset_id: &str) -> DomainResult<Decimal>;
}
