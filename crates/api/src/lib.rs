//! HTTP API for the flight booking system.
//!
//! Exposes bookings, payments and flight seat inventory over REST, with
//! structured logging (tracing) and Prometheus metrics. The booking listener
//! and the expiration reaper run beside the server in the binary.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        // Bookings
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route(
            "/bookings/reference/{reference}",
            get(routes::bookings::get_by_reference::<S>),
        )
        .route(
            "/bookings/user/{user_id}",
            get(routes::bookings::list_by_user::<S>),
        )
        .route("/bookings/{id}/confirm", put(routes::bookings::confirm::<S>))
        .route("/bookings/{id}/cancel", put(routes::bookings::cancel::<S>))
        // Payments
        .route("/payments", post(routes::payments::initiate::<S>))
        .route(
            "/payments/capture/{order_id}",
            post(routes::payments::capture::<S>),
        )
        .route("/payments/{id}", get(routes::payments::get::<S>))
        .route(
            "/payments/booking/{booking_id}",
            get(routes::payments::get_by_booking::<S>),
        )
        .route(
            "/payments/user/{user_id}",
            get(routes::payments::list_by_user::<S>),
        )
        .route("/payments/{id}/cancel", put(routes::payments::cancel::<S>))
        // Flight seats
        .route(
            "/flights/{flight_id}/seats",
            post(routes::flights::generate::<S>).get(routes::flights::list::<S>),
        )
        .route(
            "/flights/{flight_id}/seats/available",
            get(routes::flights::list_available::<S>),
        )
        .route(
            "/flights/{flight_id}/occupancy",
            get(routes::flights::occupancy::<S>),
        )
        .route(
            "/flights/{flight_id}/seats/{seat_number}/reserve",
            put(routes::flights::reserve::<S>),
        )
        .route(
            "/flights/{flight_id}/seats/{seat_number}/release",
            put(routes::flights::release::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
