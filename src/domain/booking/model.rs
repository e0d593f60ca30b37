//! Booking domain entity and its status state machine

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::errors::{DomainError, DomainResult};

/// Booking status
///
/// ```text
/// Pending ──► Confirmed ──► Completed
///    │            │
///    └──► Cancelled ◄──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, not yet holding the asset
    Pending,
    /// Holds the asset for its window
    Confirmed,
    /// Withdrawn before completion (terminal)
    Cancelled,
    /// Rental finished (terminal)
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Cancelled,
        Self::Completed,
    ];

    /// Statuses whose bookings make an asset unavailable for their window.
    pub const BLOCKING: &'static [BookingStatus] = &[Self::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub fn is_blocking(&self) -> bool {
        Self::BLOCKING.contains(self)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
        )
    }

    /// Validate `self -> next` against the transition table.
    pub fn transition_to(self, next: BookingStatus) -> DomainResult<BookingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(DomainError::Validation(format!(
                "unknown booking status '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end <= start {
            return Err(DomainError::Validation(
                "end date must be after start date".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A booking that has not been persisted yet. Always stored as `Pending`.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub asset_id: String,
    pub window: Interval,
    pub total_cost: Decimal,
}

/// A persisted reservation of one asset for one time window
#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    /// Assigned by the store, immutable
    pub id: i32,
    pub user_id: String,
    pub asset_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    /// Fixed at creation
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn window(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Whether this booking makes its asset unavailable for `window`.
    pub fn blocks(&self, window: &Interval) -> bool {
        self.status.is_blocking() && self.window().overlaps(window)
    }
}

// ── Tests ──────────────────────────────────────────────────────
