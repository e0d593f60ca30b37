//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::domain::{BookingRepository, BookingStatus};
use crate::interfaces::http::common::ErrorBody;
use crate::interfaces::http::modules::bookings::{self, BookingAppState};
use crate::interfaces::http::modules::health::{self, HealthState};
use crate::interfaces::http::modules::metrics::{
    http_metrics_middleware, prometheus_metrics, MetricsState,
};
use crate::interfaces::http::modules::request_id::request_id_middleware;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        bookings::create_booking,
        bookings::list_user_bookings,
        bookings::get_booking,
        bookings::update_booking_status,
        bookings::check_availability,
    ),
    components(
        schemas(
            ErrorBody,
            health::HealthResponse,
            health::ComponentHealth,
            bookings::CreateBookingRequest,
            bookings::UpdateStatusRequest,
            bookings::BookingDto,
            bookings::AvailabilityDto,
            BookingStatus,
        )
    ),
    tags(
        (name = "Health", description = "Service and storage health"),
        (name = "Bookings", description = "Create bookings, list them per user and move them through their lifecycle"),
        (name = "Assets", description = "Asset availability for a time window"),
    ),
    info(
        title = "Fleet Booking API",
        version = "1.0.0",
        description = "Reservation engine for rentable fleet assets",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the health state for `repo`, with uptime counted from now.
pub fn health_state(repo: Arc<dyn BookingRepository>) -> HealthState {
    HealthState {
        repo,
        started_at: Arc::new(Instant::now()),
    }
}

/// Create the API router with all routes
pub fn create_api_router(
    booking_state: BookingAppState,
    health_state: HealthState,
    prometheus_handle: PrometheusHandle,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let booking_routes = Router::new()
        .route("/", post(bookings::create_booking))
        .route("/user/{user_id}", get(bookings::list_user_bookings))
        .route("/{id}", get(bookings::get_booking))
        .route("/{id}/status", put(bookings::update_booking_status))
        .with_state(booking_state.clone());

    let asset_routes = Router::new()
        .route(
            "/{asset_id}/availability",
            get(bookings::check_availability),
        )
        .with_state(booking_state);

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health_state);

    let metrics_routes = Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(MetricsState {
            handle: prometheus_handle,
        });

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .merge(swagger_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/assets", asset_routes)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ── Tests ──────────────────────────────────────────────────────
