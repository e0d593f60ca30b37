//! Booking repository interface

use async_trait::async_trait;

use super::model::{Booking, BookingStatus, NewBooking};
use crate::shared::errors::DomainResult;

/// A requested status change, applied atomically by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub booking_id: i32,
    pub to: BookingStatus,
    /// Refuse the change with `Conflict` if the booking would then overlap
    /// another blocking booking on the same asset.
    pub exclusive: bool,
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a new `Pending` booking and assign its id.
    ///
    /// The overlap check against blocking bookings of the same asset and the
    /// insert happen as one atomic unit; if an overlap exists at commit time
    /// this fails with `Conflict` and nothing is written.
    async fn insert(&self, booking: NewBooking) -> DomainResult<Booking>;

    /// Find booking by ID
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>>;

    /// All bookings of an asset whose status is one of `statuses`
    async fn find_by_asset_and_status(
        &self,
        asset_id: &str,
        statuses: &[BookingStatus],
    ) -> DomainResult<Vec<Booking>>;

    /// All bookings of a user in insertion order
    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>>;

    /// Apply a status change.
    ///
    /// Re-reads the current status and validates the transition inside the
    /// same atomic unit as the write, so concurrent changes cannot walk an
    /// illegal edge. Fails with `NotFound`, `InvalidTransition` or `Conflict`.
    async fn update_status(&self, change: StatusChange) -> DomainResult<Booking>;

    /// Cheap liveness probe for health checks
    async fn ping(&self) -> DomainResult<()>;
}
