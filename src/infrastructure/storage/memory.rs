//! In-memory booking store
//!
//! Bookings are grouped per asset in a `DashMap`, so the overlap check and
//! the write for one asset happen under that asset's entry lock while other
//! assets proceed independently. Two side indexes map ids to assets and
//! users to ids.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::{
    Booking, BookingRepository, BookingStatus, DomainError, DomainResult, NewBooking,
    StatusChange,
};

/// In-memory storage for development and testing
pub struct InMemoryBookingRepository {
    by_asset: DashMap<String, Vec<Booking>>,
    asset_of: DashMap<i32, String>,
    by_user: DashMap<String, Vec<i32>>,
    id_counter: AtomicI32,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self {
            by_asset: DashMap::new(),
            asset_of: DashMap::new(),
            by_user: DashMap::new(),
            id_counter: AtomicI32::new(1),
        }
    }

    fn find_in_asset(&self, asset_id: &str, id: i32) -> Option<Booking> {
        self.by_asset
            .get(asset_id)
            .and_then(|bookings| bookings.iter().find(|b| b.id == id).cloned())
    }
}

impl Default for InMemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, new: NewBooking) -> DomainResult<Booking> {
        let mut bookings = self.by_asset.entry(new.asset_id.clone()).or_default();

        if let Some(existing) = bookings.iter().find(|b| b.blocks(&new.window)) {
            return Err(DomainError::Conflict(format!(
                "asset {} is already booked by booking {}",
                new.asset_id, existing.id
            )));
        }

        let now = Utc::now();
        let booking = Booking {
            id: self.id_counter.fetch_add(1, Ordering::SeqCst),
            user_id: new.user_id,
            asset_id: new.asset_id,
            start_time: new.window.start,
            end_time: new.window.end,
            status: BookingStatus::Pending,
            total_cost: new.total_cost,
            created_at: now,
            updated_at: now,
        };
        bookings.push(booking.clone());
        drop(bookings);

        self.asset_of.insert(booking.id, booking.asset_id.clone());
        self.by_user
            .entry(booking.user_id.clone())
            .or_default()
            .push(booking.id);

        debug!(booking_id = booking.id, asset_id = %booking.asset_id, "Booking stored in memory");
        Ok(booking)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>> {
        let Some(asset_id) = self.asset_of.get(&id).map(|a| a.value().clone()) else {
            return Ok(None);
        };
        Ok(self.find_in_asset(&asset_id, id))
    }

    async fn find_by_asset_and_status(
        &self,
        asset_id: &str,
        statuses: &[BookingStatus],
    ) -> DomainResult<Vec<Booking>> {
        Ok(self
            .by_asset
            .get(asset_id)
            .map(|bookings| {
                bookings
                    .iter()
                    .filter(|b| statuses.contains(&b.status))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        let mut ids = self
            .by_user
            .get(user_id)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        // Ids are handed out in insertion order but may be indexed out of order.
        ids.sort_unstable();

        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(booking) = self.find_by_id(id).await? {
                result.push(booking);
            }
        }
        Ok(result)
    }

    async fn update_status(&self, change: StatusChange) -> DomainResult<Booking> {
        let asset_id = self
            .asset_of
            .get(&change.booking_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| DomainError::booking_not_found(change.booking_id))?;

        let mut bookings = self
            .by_asset
            .get_mut(&asset_id)
            .ok_or_else(|| DomainError::booking_not_found(change.booking_id))?;

        let index = bookings
            .iter()
            .position(|b| b.id == change.booking_id)
            .ok_or_else(|| DomainError::booking_not_found(change.booking_id))?;

        let next = bookings[index].status.transition_to(change.to)?;

        if change.exclusive && next.is_blocking() {
            let window = bookings[index].window();
            if let Some(existing) = bookings
                .iter()
                .find(|b| b.id != change.booking_id && b.blocks(&window))
            {
                return Err(DomainError::Conflict(format!(
                    "asset {} is already booked by booking {}",
                    asset_id, existing.id
                )));
            }
        }

        let booking = &mut bookings[index];
        booking.status = next;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}
