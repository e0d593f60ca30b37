//! Booking HTTP handlers

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use tracing::debug;

use crate::application::{BookingService, CreateBooking};
use crate::domain::{AssetDirectory, BookingStatus, DomainError};
use crate::interfaces::http::common::{ApiResult, ErrorBody, ValidatedJson};
use crate::shared::{retry_read, Deadline, RetryConfig};

use super::dto::*;

/// Optional per-request bound, in milliseconds
pub const REQUEST_TIMEOUT_HEADER: &str = "x-request-timeout-ms";

/// Application state for booking handlers
#[derive(Clone)]
pub struct BookingAppState {
    pub service: Arc<BookingService>,
    pub assets: Arc<dyn AssetDirectory>,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

/// Configured timeout, tightened by `X-Request-Timeout-Ms` when present.
fn request_deadline(state: &BookingAppState, headers: &HeaderMap) -> ApiResult<Deadline> {
    let configured = Deadline::after(state.request_timeout);
    let Some(value) = headers.get(REQUEST_TIMEOUT_HEADER) else {
        return Ok(configured);
    };
    let millis = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "{} must be a number of milliseconds",
                REQUEST_TIMEOUT_HEADER
            ))
        })?;
    Ok(configured.min(Deadline::after(Duration::from_millis(millis))))
}

fn booking_id(path: Result<Path<i32>, PathRejection>) -> ApiResult<i32> {
    let Path(id) = path.map_err(|e| {
        DomainError::Validation(format!("invalid booking id: {}", e.body_text()))
    })?;
    Ok(id)
}

#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    params(
        ("x-request-timeout-ms" = Option<u64>, Header, description = "Upper bound for this request")
    ),
    responses(
        (status = 201, description = "Booking created in pending state", body = BookingDto),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Asset not available for the selected dates", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody),
        (status = 504, description = "Deadline exceeded", body = ErrorBody)
    )
)]
pub async fn create_booking(
    State(state): State<BookingAppState>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<BookingDto>)> {
    let deadline = request_deadline(&state, &headers)?;

    let rate_per_day = deadline
        .run("rate_lookup", state.assets.rate_per_day(request.asset_id.trim()))
        .await?;

    let booking = state
        .service
        .create_booking(
            CreateBooking {
                user_id: request.user_id,
                asset_id: request.asset_id,
                start_time: request.start_date,
                end_time: request.end_date,
            },
            rate_per_day,
            deadline,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

#[utoipa::path(
    get,
    path = "/api/bookings/user/{user_id}",
    tag = "Bookings",
    params(("user_id" = String, Path, description = "Owner of the bookings")),
    responses(
        (status = 200, description = "Bookings of the user in creation order", body = Vec<BookingDto>),
        (status = 400, description = "Missing user id", body = ErrorBody),
        (status = 503, description = "Storage unavailable", body = ErrorBody)
    )
)]
pub async fn list_user_bookings(
    State(state): State<BookingAppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<BookingDto>>> {
    let deadline = request_deadline(&state, &headers)?;

    let bookings = deadline
        .run(
            "list_by_user",
            retry_read(&state.retry, "list_by_user", || {
                state.service.list_by_user(&user_id, Deadline::none())
            }),
        )
        .await?;

    debug!(user_id = %user_id, count = bookings.len(), "Listed bookings");
    Ok(Json(bookings.into_iter().map(BookingDto::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/bookings/{id}",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = BookingDto),
        (status = 400, description = "Malformed booking id", body = ErrorBody),
        (status = 404, description = "Booking not found", body = ErrorBody)
    )
)]
pub async fn get_booking(
    State(state): State<BookingAppState>,
    headers: HeaderMap,
    path: Result<Path<i32>, PathRejection>,
) -> ApiResult<Json<BookingDto>> {
    let id = booking_id(path)?;
    let deadline = request_deadline(&state, &headers)?;

    let booking = deadline
        .run(
            "get_booking",
            retry_read(&state.retry, "get_booking", || {
                state.service.get_booking(id, Deadline::none())
            }),
        )
        .await?;
    Ok(Json(booking.into()))
}

#[utoipa::path(
    put,
    path = "/api/bookings/{id}/status",
    tag = "Bookings",
    params(("id" = i32, Path, description = "Booking ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Booking after the status change", body = BookingDto),
        (status = 400, description = "Unknown status or illegal transition", body = ErrorBody),
        (status = 404, description = "Booking not found", body = ErrorBody),
        (status = 409, description = "Overlaps another confirmed booking", body = ErrorBody)
    )
)]
pub async fn update_booking_status(
    State(state): State<BookingAppState>,
    headers: HeaderMap,
    path: Result<Path<i32>, PathRejection>,
    ValidatedJson(request): ValidatedJson<UpdateStatusRequest>,
) -> ApiResult<Json<BookingDto>> {
    let id = booking_id(path)?;
    let status: BookingStatus = request.status.trim().parse()?;
    let deadline = request_deadline(&state, &headers)?;

    let booking = state.service.update_status(id, status, deadline).await?;
    Ok(Json(booking.into()))
}

#[utoipa::path(
    get,
    path = "/api/assets/{asset_id}/availability",
    tag = "Assets",
    params(
        ("asset_id" = String, Path, description = "Asset to check"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability for the window", body = AvailabilityDto),
        (status = 400, description = "Invalid window", body = ErrorBody)
    )
)]
pub async fn check_availability(
    State(state): State<BookingAppState>,
    headers: HeaderMap,
    Path(asset_id): Path<String>,
    query: Result<Query<AvailabilityQuery>, QueryRejection>,
) -> ApiResult<Json<AvailabilityDto>> {
    let Query(window) = query
        .map_err(|e| DomainError::Validation(format!("invalid window: {}", e.body_text())))?;
    let deadline = request_deadline(&state, &headers)?;

    let available = state
        .service
        .is_available(&asset_id, window.start_date, window.end_date, deadline)
        .await?;

    Ok(Json(AvailabilityDto {
        asset_id,
        start_date: window.start_date,
        end_date: window.end_date,
        available,
    }))
}
