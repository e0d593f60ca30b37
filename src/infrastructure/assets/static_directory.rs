//! Configuration-backed asset directory
//!
//! Serves per-day rates from a fixed table with a fallback default. Stands in
//! for the fleet catalogue service until it is reachable from here.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{AssetDirectory, DomainResult};

#[derive(Debug, Clone)]
pub struct StaticAssetDirectory {
    default_rate: Decimal,
    rates: HashMap<String, Decimal>,
}

impl StaticAssetDirectory {
    pub fn new(default_rate: Decimal) -> Self {
        Self {
            default_rate,
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, asset_id: impl Into<String>, rate: Decimal) -> Self {
        self.rates.insert(asset_id.into(), rate);
        self
    }

    pub fn with_rates(mut self, rates: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        self.rates.extend(rates);
        self
    }
}

impl Default for StaticAssetDirectory {
    /// 50.00 per day for every asset
    fn default() -> Self {
        Self::new(Decimal::new(5000, 2))
    }
}

#[async_trait]
impl AssetDirectory for StaticAssetDirectory {
    async fn rate_per_day(&self, asset_id: &str) -> DomainResult<Decimal> {
        Ok(self
            .rates
            .get(asset_id)
            .copied()
            .unwrap_or(self.default_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_default_rate() {
        let directory = StaticAssetDirectory::default().with_rate("A7", Decimal::new(8950, 2));
        assert_eq!(directory.rate_per_day("A1").await.unwrap(), Decimal::new(5000, 2));
        assert_eq!(directory.rate_per_day("A7").await.unwrap(), Decimal::new(8950, 2));
    }

    #[tokio::test]
    async fn bulk_rates_override_default() {
        let directory = StaticAssetDirectory::new(Decimal::ONE)
            .with_rates([("A1".to_string(), Decimal::TEN), ("A2".to_string(), Decimal::new(2, 0))]);
        assert_eq!(directory.rate_per_day("A1").await.unwrap(), Decimal::TEN);
        assert_eq!(directory.rate_per_day("A2").await.unwrap(), Decimal::new(2, 0));
        assert_eq!(directory.rate_per_day("A3").await.unwrap(), Decimal::ONE);
    }
}
