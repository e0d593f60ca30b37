//! Asset availability checks

use std::sync::Arc;

use crate::domain::{Booking, BookingRepository, BookingStatus, DomainResult, Interval};

/// Answers whether an asset is free for a time window.
///
/// Reads only. The answer can be stale by the time the caller acts on it;
/// the store repeats the check when a booking is actually written.
#[derive(Clone)]
pub struct AvailabilityChecker {
    repo: Arc<dyn BookingRepository>,
}

impl AvailabilityChecker {
    pub fn new(repo: Arc<dyn BookingRepository>) -> Self {
        Self { repo }
    }

    /// Blocking bookings of `asset_id` that overlap `window`.
    pub async fn conflicts(&self, asset_id: &str, window: &Interval) -> DomainResult<Vec<Booking>> {
        let blocking = self
            .repo
            .find_by_asset_and_status(asset_id, BookingStatus::BLOCKING)
            .await?;
        Ok(blocking
            .into_iter()
            .filter(|b| b.window().overlaps(window))
            .collect())
    }

    pub async fn is_available(&self, asset_id: &str, window: &Interval) -> DomainResult<bool> {
        Ok(self.conflicts(asset_id, window).await?.is_empty())
    }
}
