//! Booking lifecycle service
//!
//! Entry point for every booking use case: creation (validate, check
//! availability, price, persist) and status changes along the state machine
//! in [`BookingStatus`]. Holds no mutable state of its own and is shared
//! between request handlers behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::availability::AvailabilityChecker;
use super::pricing;
use crate::domain::{
    Booking, BookingRepository, BookingStatus, DomainError, DomainResult, Interval, NewBooking,
    StatusChange,
};
use crate::shared::Deadline;

/// Input of [`BookingService::create_booking`]
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user_id: String,
    pub asset_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub struct BookingService {
    repo: Arc<dyn BookingRepository>,
    availability: AvailabilityChecker,
    recheck_on_confirm: bool,
    clock: fn() -> DateTime<Utc>,
}

impl BookingService {
    pub fn new(repo: Arc<dyn BookingRepository>) -> Self {
        Self {
            availability: AvailabilityChecker::new(repo.clone()),
            repo,
            recheck_on_confirm: true,
            clock: Utc::now,
        }
    }

    /// When enabled, `Pending -> Confirmed` is refused if another confirmed
    /// booking already holds an overlapping window on the same asset.
    pub fn with_recheck_on_confirm(mut self, enabled: bool) -> Self {
        self.recheck_on_confirm = enabled;
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn availability(&self) -> &AvailabilityChecker {
        &self.availability
    }

    /// Create a `Pending` booking priced at `rate_per_day`.
    pub async fn create_booking(
        &self,
        request: CreateBooking,
        rate_per_day: Decimal,
        deadline: Deadline,
    ) -> DomainResult<Booking> {
        deadline
            .run("create_booking", self.create(request, rate_per_day))
            .await
    }

    async fn create(&self, request: CreateBooking, rate_per_day: Decimal) -> DomainResult<Booking> {
        let user_id = required_id("user_id", &request.user_id)?;
        let asset_id = required_id("asset_id", &request.asset_id)?;

        if request.start_time <= (self.clock)() {
            return Err(DomainError::Validation(
                "start date must be in the future".to_string(),
            ));
        }
        let window = Interval::new(request.start_time, request.end_time)?;

        if rate_per_day.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "asset {} has a negative daily rate",
                asset_id
            )));
        }

        let conflicts = self.availability.conflicts(&asset_id, &window).await?;
        if let Some(existing) = conflicts.first() {
            metrics::counter!("booking_conflicts_total").increment(1);
            info!(
                asset_id = %asset_id,
                conflicting_booking = existing.id,
                "Asset not available for requested window"
            );
            return Err(DomainError::Conflict(format!(
                "asset {} is not available for the selected dates",
                asset_id
            )));
        }

        let total_cost = pricing::compute_cost(rate_per_day, &window);
        debug!(asset_id = %asset_id, %rate_per_day, %total_cost, "Booking priced");

        let booking = self
            .repo
            .insert(NewBooking {
                user_id,
                asset_id,
                window,
                total_cost,
            })
            .await
            .inspect_err(|e| {
                if matches!(e, DomainError::Conflict(_)) {
                    metrics::counter!("booking_conflicts_total").increment(1);
                    info!(error = %e, "Booking lost race for asset window");
                }
            })?;

        metrics::counter!("bookings_created_total").increment(1);
        info!(
            booking_id = booking.id,
            user_id = %booking.user_id,
            asset_id = %booking.asset_id,
            total_cost = %booking.total_cost,
            "Booking created"
        );
        Ok(booking)
    }

    /// Move a booking to `new_status` if the state machine allows it.
    pub async fn update_status(
        &self,
        booking_id: i32,
        new_status: BookingStatus,
        deadline: Deadline,
    ) -> DomainResult<Booking> {
        deadline
            .run("update_status", self.transition(booking_id, new_status))
            .await
    }

    async fn transition(&self, booking_id: i32, new_status: BookingStatus) -> DomainResult<Booking> {
        let current = self
            .repo
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| DomainError::booking_not_found(booking_id))?;

        if let Err(e) = current.status.transition_to(new_status) {
            warn!(booking_id, from = %current.status, to = %new_status, "Rejected status change");
            return Err(e);
        }

        let booking = self
            .repo
            .update_status(StatusChange {
                booking_id,
                to: new_status,
                exclusive: self.recheck_on_confirm && new_status.is_blocking(),
            })
            .await?;

        metrics::counter!("booking_status_changes_total", "to" => new_status.as_str())
            .increment(1);
        info!(booking_id, from = %current.status, to = %booking.status, "Booking status changed");
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: i32, deadline: Deadline) -> DomainResult<Booking> {
        deadline
            .run("get_booking", async {
                self.repo
                    .find_by_id(booking_id)
                    .await?
                    .ok_or_else(|| DomainError::booking_not_found(booking_id))
            })
            .await
    }

    /// Snapshot of a user's bookings in insertion order.
    pub async fn list_by_user(&self, user_id: &str, deadline: Deadline) -> DomainResult<Vec<Booking>> {
        let user_id = required_id("user_id", user_id)?;
        deadline
            .run("list_by_user", self.repo.list_by_user(&user_id))
            .await
    }

    pub async fn is_available(
        &self,
        asset_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        deadline: Deadline,
    ) -> DomainResult<bool> {
        let asset_id = required_id("asset_id", asset_id)?;
        let window = Interval::new(start_time, end_time)?;
        deadline
            .run("is_available", self.availability.is_available(&asset_id, &window))
            .await
    }
}

fn required_id(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use super::*;
    use crate::infrastructure::storage::InMemoryBookingRepository;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    fn new_year() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    fn service() -> BookingService {
        BookingService::new(Arc::new(InMemoryBookingRepository::new())).with_clock(new_year)
    }

    fn request(user: &str, asset: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> CreateBooking {
        CreateBooking {
            user_id: user.into(),
            asset_id: asset.into(),
            start_time: from,
            end_time: to,
        }
    }

    fn fifty() -> Decimal {
        Decimal::new(5000, 2)
    }

    async fn create(svc: &BookingService, asset: &str, from: u32, to: u32) -> DomainResult<Booking> {
        svc.create_booking(request("u1", asset, day(from), day(to)), fifty(), Deadline::none())
            .await
    }

    #[tokio::test]
    async fn create_prices_and_stores_pending_booking() {
        let svc = service();
        let booking = create(&svc, "A1", 10, 13).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_cost, Decimal::new(15000, 2));
        assert_eq!(booking.asset_id, "A1");
        assert_eq!(booking.start_time, day(10));
        assert_eq!(booking.end_time, day(13));
    }

    #[tokio::test]
    async fn overlapping_create_after_confirm_conflicts() {
        let svc = service();
        let booking = create(&svc, "A1", 10, 13).await.unwrap();
        svc.update_status(booking.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap();

        let err = create(&svc, "A1", 11, 12).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn overlapping_pending_bookings_coexist() {
        let svc = service();
        create(&svc, "A1", 10, 13).await.unwrap();
        create(&svc, "A1", 11, 12).await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_cannot_be_confirmed() {
        let svc = service();
        let booking = create(&svc, "A1", 10, 13).await.unwrap();
        svc.update_status(booking.id, BookingStatus::Cancelled, Deadline::none())
            .await
            .unwrap();

        let err = svc
            .update_status(booking.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed
            }
        ));
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let svc = service();
        let err = svc
            .update_status(999, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        let err = svc.get_booking(999, Deadline::none()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn start_in_past_is_rejected() {
        let svc = BookingService::new(Arc::new(InMemoryBookingRepository::new()));
        let start = Utc::now() - Duration::hours(1);
        let err = svc
            .create_booking(
                request("u1", "A1", start, start + Duration::days(2)),
                fifty(),
                Deadline::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn start_equal_to_now_is_rejected() {
        let svc = service();
        let err = svc
            .create_booking(request("u1", "A1", new_year(), day(3)), fifty(), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn end_not_after_start_is_rejected() {
        let svc = service();
        assert!(matches!(
            create(&svc, "A1", 13, 10).await.unwrap_err(),
            DomainError::Validation(_)
        ));
        assert!(matches!(
            create(&svc, "A1", 10, 10).await.unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn blank_ids_and_negative_rate_are_rejected() {
        let svc = service();
        let err = svc
            .create_booking(request("  ", "A1", day(10), day(11)), fifty(), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = svc
            .create_booking(request("u1", "A1", day(10), day(11)), -fifty(), Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn status_walk_follows_state_machine() {
        let svc = service();
        let booking = create(&svc, "A1", 10, 13).await.unwrap();

        let confirmed = svc
            .update_status(booking.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = svc
            .update_status(booking.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let completed = svc
            .update_status(booking.id, BookingStatus::Completed, Deadline::none())
            .await
            .unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        assert_eq!(completed.total_cost, booking.total_cost);

        for to in BookingStatus::ALL {
            assert!(svc
                .update_status(booking.id, to, Deadline::none())
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn confirm_rechecks_overlap() {
        let svc = service();
        let first = create(&svc, "A1", 10, 13).await.unwrap();
        let second = create(&svc, "A1", 12, 14).await.unwrap();

        svc.update_status(first.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap();
        let err = svc
            .update_status(second.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // Cancelling the holder frees the window again
        svc.update_status(first.id, BookingStatus::Cancelled, Deadline::none())
            .await
            .unwrap();
        svc.update_status(second.id, BookingStatus::Confirmed, Deadline::none())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn confirm_without_recheck_keeps_legacy_policy() {
        let svc = service().with_recheck_on_confirm(false);
        let first = create(&svc, "A1", 10, 13).await.unwrap();
        let second = create(&svc, "A1", 12, 14).await.unwrap();

        for id in [first.id, second.id] {
            svc.update_status(id, BookingStatus::Confirmed, Deadline::none())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn concurrent_create_and_confirm_never_double_books() {
        let svc = Arc::new(service());
        let mut handles = Vec::new();
        for i in 0..32u32 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let booking = svc
                    .create_booking(
                        request(&format!("u{}", i), "A1", day(10), day(13)),
                        fifty(),
                        Deadline::none(),
                    )
                    .await?;
                svc.update_status(booking.id, BookingStatus::Confirmed, Deadline::none())
                    .await
            }));
        }

        let mut confirmed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(b) => {
                    assert_eq!(b.status, BookingStatus::Confirmed);
                    confirmed += 1;
                }
                Err(e) => assert!(matches!(e, DomainError::Conflict(_)), "unexpected {e}"),
            }
        }
        assert_eq!(confirmed, 1);

        let window = Interval::new(day(10), day(13)).unwrap();
        let holders = svc.availability().conflicts("A1", &window).await.unwrap();
        assert_eq!(holders.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_operations_on_different_assets_all_succeed() {
        let svc = Arc::new(service());
        let mut handles = Vec::new();
        for i in 0..16u32 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let asset = format!("A{}", i);
                let booking = svc
                    .create_booking(request("u1", &asset, day(10), day(13)), fifty(), Deadline::none())
                    .await?;
                svc.update_status(booking.id, BookingStatus::Confirmed, Deadline::none())
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(svc.list_by_user("u1", Deadline::none()).await.unwrap().len(), 16);
    }

    #[tokio::test]
    async fn list_by_user_is_repeatable() {
        let svc = service();
        create(&svc, "A1", 10, 11).await.unwrap();
        create(&svc, "A2", 12, 13).await.unwrap();

        let first = svc.list_by_user("u1", Deadline::none()).await.unwrap();
        let second = svc.list_by_user("u1", Deadline::none()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[0].id < first[1].id);
        assert!(svc.list_by_user("u2", Deadline::none()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn is_available_validates_window() {
        let svc = service();
        assert!(svc
            .is_available("A1", day(10), day(12), Deadline::none())
            .await
            .unwrap());
        assert!(matches!(
            svc.is_available("A1", day(12), day(10), Deadline::none()).await,
            Err(DomainError::Validation(_))
        ));
    }

    /// Store that never answers, to exercise deadlines.
    struct StalledRepository;

    #[async_trait]
    impl BookingRepository for StalledRepository {
        async fn insert(&self, _booking: NewBooking) -> DomainResult<Booking> {
            std::future::pending().await
        }
        async fn find_by_id(&self, _id: i32) -> DomainResult<Option<Booking>> {
            std::future::pending().await
        }
        async fn find_by_asset_and_status(
            &self,
            _asset_id: &str,
            _statuses: &[BookingStatus],
        ) -> DomainResult<Vec<Booking>> {
            Ok(Vec::new())
        }
        async fn list_by_user(&self, _user_id: &str) -> DomainResult<Vec<Booking>> {
            std::future::pending().await
        }
        async fn update_status(&self, _change: StatusChange) -> DomainResult<Booking> {
            std::future::pending().await
        }
        async fn ping(&self) -> DomainResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stalled_store_hits_deadline() {
        let svc = BookingService::new(Arc::new(StalledRepository)).with_clock(new_year);
        let deadline = Deadline::after(StdDuration::from_millis(20));

        let err = svc
            .create_booking(request("u1", "A1", day(10), day(11)), fifty(), deadline)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DeadlineExceeded("create_booking")));

        let err = svc
            .update_status(1, BookingStatus::Confirmed, Deadline::after(StdDuration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DeadlineExceeded("update_status")));
    }
}
