//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_store::EventStore;
use messaging::BOOKING_PAYMENT_EVENTS_QUEUE;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Payment events waiting for the booking listener.
    pub pending_payment_events: usize,
}

/// GET /health
pub async fn check<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pending_payment_events: state.broker.queue_depth(BOOKING_PAYMENT_EVENTS_QUEUE),
    })
}
