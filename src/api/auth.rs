//! API key authentication
//!
//! When `api.api_key` is set, every request under `/api/v1` must carry the
//! same value in the `X-Api-Key` header.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;

/// Middleware rejecting requests without the expected `X-Api-Key` header
///
/// Passes everything through when no key is configured; otherwise answers
/// 401 with an [`ApiError`] body for a missing or mismatched key.
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware};
/// use doc_intake::api::auth::require_api_key;
///
/// let router: Router = Router::new().layer(middleware::from_fn_with_state(
///     Some("intake-key".to_string()),
///     require_api_key,
/// ));
/// ```
pub async fn require_api_key(
    State(expected_api_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_key) = expected_api_key else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected_key.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::debug!(path = %request.uri().path(), "Rejected request with invalid API key");
            unauthorized("Invalid API key")
        }
        None => unauthorized("Missing X-Api-Key header"),
    }
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError::new("unauthorized", message)),
    )
        .into_response()
}
