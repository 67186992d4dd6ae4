//! Queue handlers: snapshot, clear, cancel.

use super::CancelBatchResponse;
use crate::api::AppState;
use crate::error::Error;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// GET /queue - Current queue snapshot
#[utoipa::path(
    get,
    path = "/api/v1/queue",
    tag = "queue",
    responses(
        (status = 200, description = "Snapshot of the current batch, or null before the first batch", body = crate::types::QueueSnapshot)
    )
)]
pub async fn get_queue(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.coordinator.current_snapshot())
}

/// DELETE /queue - Clear the snapshot of a finished batch
#[utoipa::path(
    delete,
    path = "/api/v1/queue",
    tag = "queue",
    responses(
        (status = 204, description = "Snapshot cleared"),
        (status = 409, description = "A batch is still draining", body = crate::error::ApiError)
    )
)]
pub async fn clear_queue(State(state): State<AppState>) -> Result<StatusCode, Error> {
    state.coordinator.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /queue/cancel - Cancel the draining batch between items
#[utoipa::path(
    post,
    path = "/api/v1/queue/cancel",
    tag = "queue",
    responses(
        (status = 202, description = "Cancellation requested; the in-flight item still finishes", body = CancelBatchResponse),
        (status = 404, description = "No batch is draining", body = crate::error::ApiError)
    )
)]
pub async fn cancel_batch(State(state): State<AppState>) -> Response {
    match state.coordinator.cancel_batch().await {
        Ok(batch_id) => (StatusCode::ACCEPTED, Json(CancelBatchResponse { batch_id })).into_response(),
        Err(e) => e.into_response(),
    }
}
