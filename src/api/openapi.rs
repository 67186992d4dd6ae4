//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa and served at
//! `/api/v1/openapi.json`.

use utoipa::OpenApi;

/// OpenAPI documentation for the doc-intake REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "doc-intake REST API",
        version = "0.1.0",
        description = "Submit document batches for OCR extraction and follow their progress",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:6790/api/v1", description = "Local development server")
    ),
    paths(
        // Batches
        crate::api::routes::submit_batch,

        // Queue
        crate::api::routes::get_queue,
        crate::api::routes::clear_queue,
        crate::api::routes::cancel_batch,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::BatchId,
        crate::types::ItemStatus,
        crate::types::ItemErrorKind,
        crate::types::BatchPhase,
        crate::types::QueueItem,
        crate::types::QueueSnapshot,
        crate::types::BatchSummary,
        crate::types::DocumentMetadata,
        crate::types::ConfidenceReport,
        crate::types::ExtractionResult,
        crate::types::Event,

        // Config types from config.rs
        crate::config::Config,
        crate::config::ExtractionConfig,
        crate::config::QueueConfig,
        crate::config::BusyPolicy,
        crate::config::RetryConfig,
        crate::config::ApiConfig,

        // API request/response types from routes
        crate::api::routes::SubmitBatchResponse,
        crate::api::routes::CancelBatchResponse,
        crate::api::routes::HealthResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "batches", description = "Batch submission - Upload files for extraction"),
        (name = "queue", description = "Queue - Inspect, clear or cancel the current batch"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds the `X-Api-Key` header scheme
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
