//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics: Prometheus text exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}

/// Registers help text for the saga's metrics with the installed recorder.
pub fn describe() {
    describe_counter!("bookings_created_total", "Bookings created");
    describe_counter!("bookings_confirmed_total", "Bookings confirmed after payment");
    describe_counter!("bookings_cancelled_total", "Bookings cancelled");
    describe_counter!("bookings_expired_total", "Pending bookings expired by the reaper");
    describe_counter!(
        "booking_seat_conflicts_total",
        "Booking attempts that found a seat already held"
    );
    describe_histogram!(
        "booking_create_duration_seconds",
        Unit::Seconds,
        "Time to hold seats and persist a booking"
    );
    describe_counter!(
        "seat_compensations_total",
        "Seats released to undo a failed booking creation"
    );
    describe_counter!("payments_initiated_total", "Payments opened");
    describe_counter!("payments_completed_total", "Payments captured");
    describe_counter!("payments_failed_total", "Payments failed at the provider");
    describe_counter!("payments_cancelled_total", "Payments cancelled before capture");
    describe_counter!("channel_messages_published_total", "Messages published per exchange");
    describe_counter!(
        "channel_messages_redelivered_total",
        "Unacknowledged messages handed out again"
    );
    describe_counter!(
        "listener_messages_processed_total",
        "Payment events applied to bookings"
    );
    describe_counter!(
        "listener_messages_dropped_total",
        "Payment events acknowledged without effect"
    );
    describe_counter!("reaper_sweeps_total", "Expiration sweeps run");
    describe_counter!("retry_attempts_total", "Collaborator calls retried");
    describe_counter!(
        "command_conflict_retries_total",
        "Aggregate writes retried after a concurrent write"
    );
    describe_counter!(
        "projections_events_processed",
        "Events applied to read models"
    );
    describe_counter!(
        "event_store_events_appended_total",
        "Events appended per store backend"
    );
    describe_counter!(
        "event_store_conflicts_total",
        "Appends rejected by the expected-version check"
    );
}
