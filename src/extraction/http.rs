//! Multipart HTTP client for the extraction endpoint

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::ExtractionService;
use crate::config::ExtractionConfig;
use crate::error::{Error, ItemError, Result, is_transient_status};
use crate::types::{ExtractionResult, SourceFile};
use crate::utils::file_extension;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Success body as sent by the service; `success: false` is treated as undecodable
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(flatten)]
    result: ExtractionResult,
}

/// [`ExtractionService`] that uploads to an HTTP endpoint with `reqwest`
///
/// Each call is `POST {endpoint}?languages=..` with a multipart body holding
/// the file bytes under the configured field.
#[derive(Clone, Debug)]
pub struct HttpExtractionService {
    client: reqwest::Client,
    endpoint: url::Url,
    file_field: String,
    languages: Option<String>,
    api_key: Option<String>,
}

impl HttpExtractionService {
    /// Build a client from configuration
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint).map_err(|e| Error::Config {
            message: format!("invalid extraction endpoint '{}': {}", config.endpoint, e),
            key: Some("extraction.endpoint".to_string()),
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            file_field: config.file_field.clone(),
            languages: config.languages.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn build_form(
        &self,
        file: &SourceFile,
        bytes: bytes::Bytes,
    ) -> std::result::Result<reqwest::multipart::Form, ItemError> {
        let len = bytes.len() as u64;
        let part = reqwest::multipart::Part::stream_with_length(reqwest::Body::from(bytes), len)
            .file_name(file.name.clone())
            .mime_str(mime_for(&file.name))?;
        Ok(reqwest::multipart::Form::new().part(self.file_field.clone(), part))
    }
}

#[async_trait]
impl ExtractionService for HttpExtractionService {
    async fn extract(&self, file: &SourceFile) -> std::result::Result<ExtractionResult, ItemError> {
        let bytes = file.read().await.map_err(|source| ItemError::Source {
            path: file
                .path()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&file.name)),
            source,
        })?;

        let form = self.build_form(file, bytes)?;
        let mut request = self.client.post(self.endpoint.clone()).multipart(form);
        if let Some(languages) = &self.languages {
            request = request.query(&[("languages", languages.as_str())]);
        }
        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            file = %file.name,
            size = file.size_bytes,
            "uploading file for extraction"
        );
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ItemError::Transport {
                status: Some(status.as_u16()),
                message: error_detail(&body).unwrap_or_else(|| status.to_string()),
                transient: is_transient_status(status.as_u16()),
            });
        }

        let body = response.bytes().await?;
        let envelope: Envelope =
            serde_json::from_slice(&body).map_err(|e| ItemError::Decode(e.to_string()))?;
        if envelope.success == Some(false) {
            return Err(ItemError::Decode(
                "service reported success=false".to_string(),
            ));
        }
        Ok(envelope.result)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Pull the `detail` message out of an error body, if it has one
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn mime_for(name: &str) -> &'static str {
    match file_extension(name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}
