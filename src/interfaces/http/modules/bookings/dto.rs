//! Booking DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::{Booking, BookingStatus};

/// Identifiers arrive as JSON strings or as non-negative integers; both end
/// up as the opaque string the engine works with.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Request to create a booking
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBookingRequest {
    /// Booking user (string or integer)
    #[serde(deserialize_with = "string_or_number")]
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub user_id: String,
    /// Asset to book, string or integer (`car_id` is accepted as well)
    #[serde(alias = "car_id", deserialize_with = "string_or_number")]
    #[validate(length(min = 1, max = 128, message = "must be 1-128 characters"))]
    pub asset_id: String,
    /// Start of the rental (RFC 3339), must be in the future
    pub start_date: DateTime<Utc>,
    /// End of the rental (RFC 3339), must be after `start_date`
    pub end_date: DateTime<Utc>,
}

/// Request to move a booking to another status
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of `pending`, `confirmed`, `cancelled`, `completed`
    #[validate(length(min = 1, message = "is required"))]
    pub status: String,
}

/// Booking in API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingDto {
    pub id: i32,
    pub user_id: String,
    pub asset_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: BookingStatus,
    /// Price in currency units, two decimal places
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_cost: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingDto {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            user_id: b.user_id,
            asset_id: b.asset_id,
            start_date: b.start_time,
            end_date: b.end_time,
            status: b.status,
            total_cost: b.total_cost,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

/// Window to check an asset's availability for
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityDto {
    pub asset_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// `false` when a confirmed booking overlaps the window
    pub available: bool,
}
