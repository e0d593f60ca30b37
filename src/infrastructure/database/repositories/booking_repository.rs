//! SeaORM implementation of BookingRepository
//!
//! Writes that depend on the state of an asset are single conditional
//! statements: the insert is an `INSERT .. SELECT .. WHERE NOT EXISTS` over
//! the blocking bookings of the asset, and a status change is an `UPDATE`
//! guarded by the status it was validated against. SQLite runs each one under
//! its write lock, so writers on different assets only queue on that lock
//! (bounded by the busy timeout) instead of failing a lock upgrade.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Query, SimpleExpr};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Statement,
};
use tracing::debug;

use crate::domain::{
    Booking, BookingRepository, BookingStatus, DomainError, DomainResult, Interval, NewBooking,
    StatusChange,
};
use crate::infrastructure::database::entities::booking;

pub struct SeaOrmBookingRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn status_to_db(status: BookingStatus) -> booking::BookingStatus {
    match status {
        BookingStatus::Pending => booking::BookingStatus::Pending,
        BookingStatus::Confirmed => booking::BookingStatus::Confirmed,
        BookingStatus::Cancelled => booking::BookingStatus::Cancelled,
        BookingStatus::Completed => booking::BookingStatus::Completed,
    }
}

fn status_from_db(status: booking::BookingStatus) -> BookingStatus {
    match status {
        booking::BookingStatus::Pending => BookingStatus::Pending,
        booking::BookingStatus::Confirmed => BookingStatus::Confirmed,
        booking::BookingStatus::Cancelled => BookingStatus::Cancelled,
        booking::BookingStatus::Completed => BookingStatus::Completed,
    }
}

fn cost_to_cents(cost: Decimal) -> DomainResult<i64> {
    (cost * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| DomainError::Validation(format!("total cost {} is out of range", cost)))
}

fn model_to_domain(m: booking::Model) -> Booking {
    Booking {
        id: m.id,
        user_id: m.user_id,
        asset_id: m.asset_id,
        start_time: m.start_date,
        end_time: m.end_date,
        status: status_from_db(m.status),
        total_cost: Decimal::new(m.total_cost_cents, 2),
        created_at: m.created_at,
        updated_at: m.updated_at,
    }
}

/// `NOT EXISTS` over blocking bookings of `asset_id` overlapping `window`,
/// optionally ignoring one id.
fn no_blocking_overlap(asset_id: &str, window: &Interval, except: Option<i32>) -> SimpleExpr {
    let mut overlapping = Query::select();
    overlapping
        .expr(Expr::val(1))
        .from(booking::Entity)
        .and_where(booking::Column::AssetId.eq(asset_id))
        .and_where(
            booking::Column::Status
                .is_in(BookingStatus::BLOCKING.iter().copied().map(status_to_db)),
        )
        .and_where(booking::Column::StartDate.lt(window.end))
        .and_where(booking::Column::EndDate.gt(window.start));
    if let Some(id) = except {
        overlapping.and_where(booking::Column::Id.ne(id));
    }
    Expr::exists(overlapping).not()
}

// ── BookingRepository impl ──────────────────────────────────────

#[async_trait]
impl BookingRepository for SeaOrmBookingRepository {
    async fn insert(&self, new: NewBooking) -> DomainResult<Booking> {
        let total_cost_cents = cost_to_cents(new.total_cost)?;
        let now = Utc::now();

        let mut candidate = Query::select();
        candidate
            .exprs([
                Expr::val(new.user_id.clone()),
                Expr::val(new.asset_id.clone()),
                Expr::val(new.window.start),
                Expr::val(new.window.end),
                Expr::val(booking::BookingStatus::Pending),
                Expr::val(total_cost_cents),
                Expr::val(now),
                Expr::val(now),
            ])
            .and_where(no_blocking_overlap(&new.asset_id, &new.window, None));

        let insert = Query::insert()
            .into_table(booking::Entity)
            .columns([
                booking::Column::UserId,
                booking::Column::AssetId,
                booking::Column::StartDate,
                booking::Column::EndDate,
                booking::Column::Status,
                booking::Column::TotalCostCents,
                booking::Column::CreatedAt,
                booking::Column::UpdatedAt,
            ])
            .select_from(candidate)
            .map_err(|e| DomainError::Store(e.to_string()))?
            .to_owned();

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&insert)).await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::Conflict(format!(
                "asset {} is not available for the selected dates",
                new.asset_id
            )));
        }

        let id = i32::try_from(result.last_insert_id())
            .map_err(|_| DomainError::Store("booking id out of range".into()))?;
        debug!(booking_id = id, "Booking inserted");

        Ok(Booking {
            id,
            user_id: new.user_id,
            asset_id: new.asset_id,
            start_time: new.window.start,
            end_time: new.window.end,
            status: BookingStatus::Pending,
            total_cost: Decimal::new(total_cost_cents, 2),
            created_at: now,
            updated_at: now,
        })
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Booking>> {
        let model = booking::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(model_to_domain))
    }

    async fn find_by_asset_and_status(
        &self,
        asset_id: &str,
        statuses: &[BookingStatus],
    ) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::AssetId.eq(asset_id))
            .filter(booking::Column::Status.is_in(statuses.iter().copied().map(status_to_db)))
            .order_by_asc(booking::Column::StartDate)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list_by_user(&self, user_id: &str) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::UserId.eq(user_id))
            .order_by_asc(booking::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn update_status(&self, change: StatusChange) -> DomainResult<Booking> {
        let not_found = || DomainError::booking_not_found(change.booking_id);

        // Each retry follows a real status change, and the state machine is
        // at most two transitions deep, so this settles quickly.
        loop {
            let current = booking::Entity::find_by_id(change.booking_id)
                .one(&self.db)
                .await?
                .ok_or_else(not_found)?;

            let next = status_from_db(current.status).transition_to(change.to)?;
            let guarded = change.exclusive && next.is_blocking();
            let window = Interval {
                start: current.start_date,
                end: current.end_date,
            };

            let now = Utc::now();
            let mut update = booking::Entity::update_many()
                .col_expr(booking::Column::Status, Expr::value(status_to_db(next)))
                .col_expr(booking::Column::UpdatedAt, Expr::value(now))
                .filter(booking::Column::Id.eq(current.id))
                .filter(booking::Column::Status.eq(current.status));
            if guarded {
                update = update.filter(no_blocking_overlap(
                    &current.asset_id,
                    &window,
                    Some(current.id),
                ));
            }

            if update.exec(&self.db).await?.rows_affected == 1 {
                debug!(booking_id = current.id, status = %next, "Booking status updated");
                let mut updated = model_to_domain(current);
                updated.status = next;
                updated.updated_at = now;
                return Ok(updated);
            }

            let latest = booking::Entity::find_by_id(change.booking_id)
                .one(&self.db)
                .await?
                .ok_or_else(not_found)?;
            if guarded && latest.status == current.status {
                return Err(DomainError::Conflict(format!(
                    "asset {} is already booked for an overlapping window",
                    current.asset_id
                )));
            }
            debug!(
                booking_id = current.id,
                "Booking status changed concurrently, re-validating"
            );
        }
    }

    async fn ping(&self) -> DomainResult<()> {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                "SELECT 1".to_string(),
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::infrastructure::database::migrator::Migrator;
    use crate::infrastructure::database::{init_database, DatabaseConfig};
    use chrono::{DateTime, TimeZone};
    use sea_orm::{ConnectOptions, Database};
    use sea_orm_migration::MigratorTrait;

    async fn repo() -> SeaOrmBookingRepository {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmBookingRepository::new(db)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
    }

    fn new_booking(user: &str, asset: &str, from: u32, to: u32) -> NewBooking {
        NewBooking {
            user_id: user.into(),
            asset_id: asset.into(),
            window: Interval::new(day(from), day(to)).unwrap(),
            total_cost: Decimal::new(15000, 2),
        }
    }

    fn change(id: i32, to: BookingStatus) -> StatusChange {
        StatusChange {
            booking_id: id,
            to,
            exclusive: true,
        }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let repo = repo().await;
        let created = repo.insert(new_booking("u1", "A1", 10, 13)).await.unwrap();

        assert!(created.id > 0);
        assert_eq!(created.status, BookingStatus::Pending);
        assert_eq!(created.total_cost, Decimal::new(15000, 2));
        assert_eq!(created.start_time, day(10));

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.total_cost, created.total_cost);
        assert_eq!(found.end_time, day(13));
        assert!(repo.find_by_id(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conditional_insert_rejects_confirmed_overlap() {
        let repo = repo().await;
        let first = repo.insert(new_booking("u1", "A1", 10, 13)).await.unwrap();
        repo.update_status(change(first.id, BookingStatus::Confirmed))
            .await
            .unwrap();

        let err = repo.insert(new_booking("u2", "A1", 11, 12)).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        repo.insert(new_booking("u2", "A1", 13, 14)).await.unwrap();
        repo.insert(new_booking("u2", "A2", 11, 12)).await.unwrap();
        assert_eq!(repo.list_by_user("u2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn status_changes_follow_state_machine() {
        let repo = repo().await;
        let b = repo.insert(new_booking("u1", "A1", 10, 13)).await.unwrap();

        let confirmed = repo
            .update_status(change(b.id, BookingStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let err = repo
            .update_status(change(b.id, BookingStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        let err = repo
            .update_status(change(404, BookingStatus::Cancelled))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn exclusive_confirm_ignores_self_and_detects_others() {
        let repo = repo().await;
        let a = repo.insert(new_booking("u1", "A1", 10, 13)).await.unwrap();
        let b = repo.insert(new_booking("u2", "A1", 12, 15)).await.unwrap();

        repo.update_status(change(a.id, BookingStatus::Confirmed))
            .await
            .unwrap();
        let err = repo
            .update_status(change(b.id, BookingStatus::Confirmed))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let blocking = repo
            .find_by_asset_and_status("A1", BookingStatus::BLOCKING)
            .await
            .unwrap();
        assert_eq!(blocking.len(), 1);
        assert_eq!(blocking[0].id, a.id);
    }

    #[tokio::test]
    async fn list_by_user_keeps_insertion_order() {
        let repo = repo().await;
        let mut inserted = Vec::new();
        for (asset, from, to) in [("A2", 20, 21), ("A1", 10, 11), ("A3", 15, 16)] {
            inserted.push(repo.insert(new_booking("u1", asset, from, to)).await.unwrap().id);
        }

        let listed: Vec<i32> = repo
            .list_by_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(listed, inserted);
    }

    #[tokio::test]
    async fn ping_succeeds() {
        repo().await.ping().await.unwrap();
    }

    /// File-backed database behind a multi-connection pool, removed on drop.
    struct FileDb {
        path: std::path::PathBuf,
        repo: Arc<SeaOrmBookingRepository>,
    }

    impl Drop for FileDb {
        fn drop(&mut self) {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = self.path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }

    async fn file_repo() -> FileDb {
        let path = std::env::temp_dir().join(format!("bookings-{}.db", uuid::Uuid::new_v4()));
        let db = init_database(&DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", path.display()),
            max_connections: 8,
            connect_timeout_secs: 5,
        })
        .await
        .unwrap();
        Migrator::up(&db, None).await.unwrap();
        FileDb {
            path,
            repo: Arc::new(SeaOrmBookingRepository::new(db)),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_on_distinct_assets_all_succeed() {
        let file = file_repo().await;

        let inserts: Vec<_> = (0..64)
            .map(|i| {
                let repo = file.repo.clone();
                tokio::spawn(async move {
                    repo.insert(new_booking("u1", &format!("A{}", i), 10, 13)).await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in inserts {
            ids.push(handle.await.unwrap().expect("insert on a free asset").id);
        }
        assert_eq!(file.repo.list_by_user("u1").await.unwrap().len(), 64);

        let confirms: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let repo = file.repo.clone();
                tokio::spawn(async move {
                    repo.update_status(change(id, BookingStatus::Confirmed)).await
                })
            })
            .collect();
        for handle in confirms {
            let booking = handle.await.unwrap().expect("confirm on a free asset");
            assert_eq!(booking.status, BookingStatus::Confirmed);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_confirms_on_one_asset_admit_exactly_one() {
        let file = file_repo().await;
        let mut ids = Vec::new();
        for user in 0..8 {
            let b = file
                .repo
                .insert(new_booking(&format!("u{}", user), "A1", 10, 13))
                .await
                .unwrap();
            ids.push(b.id);
        }

        let confirms: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let repo = file.repo.clone();
                tokio::spawn(async move {
                    repo.update_status(change(id, BookingStatus::Confirmed)).await
                })
            })
            .collect();

        let mut confirmed = 0;
        for handle in confirms {
            match handle.await.unwrap() {
                Ok(_) => confirmed += 1,
                Err(err) => assert!(matches!(err, DomainError::Conflict(_)), "{}", err),
            }
        }
        assert_eq!(confirmed, 1);

        let err = file
            .repo
            .insert(new_booking("u9", "A1", 11, 12))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn status_change_revalidates_against_latest_status() {
        let repo = repo().await;
        let b = repo.insert(new_booking("u1", "A1", 10, 13)).await.unwrap();
        repo.update_status(change(b.id, BookingStatus::Cancelled))
            .await
            .unwrap();

        let err = repo
            .update_status(change(b.id, BookingStatus::Confirmed))
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

    #[test]
    fn cents_conversion() {
        assert_eq!(cost_to_cents(Decimal::new(15000, 2)).unwrap(), 15000);
        assert_eq!(cost_to_cents(Decimal::new(1042, 2)).unwrap(), 1042);
        assert_eq!(cost_to_cents(Decimal::ZERO).unwrap(), 0);
    }
}
