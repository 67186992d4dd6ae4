//! Batch submission handler.

use super::SubmitBatchResponse;
use crate::api::AppState;
use crate::error::ApiError;
use crate::types::SourceFile;
use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Multipart field carrying one file of the batch
const FILE_FIELD: &str = "file";

/// POST /batches - Submit a batch of files for extraction
///
/// Every `file` field becomes one input, in field order. Files whose extension
/// is not allowed are dropped; the batch is rejected if none remain.
#[utoipa::path(
    post,
    path = "/api/v1/batches",
    tag = "batches",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "One or more `file` fields"),
    responses(
        (status = 202, description = "Batch published and draining", body = SubmitBatchResponse),
        (status = 400, description = "No supported files, or malformed multipart body", body = crate::error::ApiError),
        (status = 409, description = "Another batch is still draining", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_batch(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut inputs = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return ApiError::new("invalid_multipart", format!("Failed to read upload: {}", e))
                    .into_response();
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload-{}", inputs.len() + 1));
        match field.bytes().await {
            Ok(bytes) => inputs.push(SourceFile::from_bytes(name, bytes)),
            Err(e) => {
                return ApiError::new(
                    "invalid_multipart",
                    format!("Failed to read file '{}': {}", name, e),
                )
                .into_response();
            }
        }
    }

    match state.coordinator.enqueue_batch(inputs).await {
        Ok(queued) => (
            StatusCode::ACCEPTED,
            Json(SubmitBatchResponse {
                batch_id: queued.batch_id,
                total: queued.total,
                rejected: queued.rejected,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
