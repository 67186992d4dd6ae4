//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`batches`] - Batch submission
//! - [`queue`] - Queue snapshot, clearing and cancellation
//! - [`system`] - Health, events, OpenAPI

use serde::{Deserialize, Serialize};

use crate::types::BatchId;

mod batches;
mod queue;
mod system;

pub use batches::*;
pub use queue::*;
pub use system::*;

/// Response for POST /batches
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct SubmitBatchResponse {
    /// Identifier of the published batch
    pub batch_id: BatchId,
    /// Number of files enqueued after extension filtering
    pub total: usize,
    /// Number of files dropped by the extension filter
    pub rejected: usize,
}

/// Response for POST /queue/cancel
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelBatchResponse {
    /// Identifier of the batch that was asked to stop
    pub batch_id: BatchId,
}

/// Response for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok" when the server answers
    pub status: String,
    /// Crate version
    pub version: String,
    /// Whether a batch is currently draining
    pub busy: bool,
}
