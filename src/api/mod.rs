//! REST API server module
//!
//! Exposes the upload coordinator over HTTP: batch submission, the current
//! queue snapshot, cancellation and a server-sent events stream.

use crate::{Config, Result, UploadCoordinator};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Path of the OpenAPI document loaded by Swagger UI
pub const SWAGGER_DOC_PATH: &str = "/api-docs/openapi.json";

/// Create the API router with all route definitions
///
/// Every route is mounted under `/api/v1`.
///
/// # Routes
///
/// ## Batches
/// - `POST /batches` - Submit files (multipart, one `file` field per file)
///
/// ## Queue
/// - `GET /queue` - Current queue snapshot (`null` before the first batch)
/// - `DELETE /queue` - Clear the snapshot of a finished batch
/// - `POST /queue/cancel` - Cancel the draining batch between items
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (outside `/api/v1`, if enabled)
/// - `GET /api-docs/openapi.json` - OpenAPI document loaded by Swagger UI (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(coordinator: Arc<UploadCoordinator>, config: Arc<Config>) -> Router {
    let state = AppState::new(coordinator, config.clone());

    let api = Router::new()
        // Batches
        .route("/batches", post(routes::submit_batch))
        // Queue
        .route("/queue", get(routes::get_queue).delete(routes::clear_queue))
        .route("/queue/cancel", post(routes::cancel_batch))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream))
        .layer(DefaultBodyLimit::max(config.api.max_upload_bytes))
        .with_state(state);

    // Apply authentication middleware if API key is configured
    let api = if config.api.api_key.is_some() {
        api.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        api
    };

    let router = Router::new().nest("/api/v1", api);

    // SwaggerUi registers its own document route; it must not overlap /api/v1/openapi.json
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url(SWAGGER_DOC_PATH, ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin; otherwise only the listed
/// origins are allowed. Methods and headers are unrestricted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails or the task is aborted.
///
/// # Example
///
/// ```no_run
/// use doc_intake::{Config, UploadCoordinator};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let coordinator = Arc::new(UploadCoordinator::new((*config).clone())?);
///
/// // Start API server (blocks until shutdown)
/// doc_intake::api::start_api_server(coordinator, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(
    coordinator: Arc<UploadCoordinator>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(coordinator, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
