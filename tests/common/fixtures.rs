//! Mock extraction service and sample documents

use doc_intake::config::RetryConfig;
use doc_intake::{Config, SourceFile};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock extraction service answers on
pub const UPLOAD_PATH: &str = "/upload-ocr";

/// Success body in the shape the OCR service returns
pub fn extraction_body(doc_id: &str, filename: &str) -> Value {
    json!({
        "success": true,
        "doc_id": doc_id,
        "filename": filename,
        "text": "भारत सरकार / Government of India",
        "metadata": {
            "page_count": 1,
            "word_count": 6,
            "language": "hin+eng",
            "has_handwriting": false
        },
        "confidence": {
            "overall_confidence": 91.2,
            "quality": "excellent",
            "recommendations": []
        },
        "category": "notice"
    })
}

/// Mount a success response for uploads whose body mentions `filename`
pub async fn mount_success(server: &MockServer, filename: &str, doc_id: &str) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains(format!("filename=\"{filename}\"")))
        .respond_with(ResponseTemplate::new(200).set_body_json(extraction_body(doc_id, filename)))
        .mount(server)
        .await;
}

/// Mount an error response for uploads whose body mentions `filename`
pub async fn mount_failure(server: &MockServer, filename: &str, status: u16, detail: &str) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains(format!("filename=\"{filename}\"")))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "detail": detail })))
        .mount(server)
        .await;
}

/// Config pointing at the mock server, with fast retries
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.extraction.endpoint = format!("{}{}", server.uri(), UPLOAD_PATH);
    config.extraction.timeout = Duration::from_secs(5);
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// In-memory document with ASCII content (wiremock matchers need UTF-8 bodies)
pub fn document(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, format!("scan of {name}").into_bytes())
}
