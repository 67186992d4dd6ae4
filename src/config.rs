//! Configuration types for doc-intake

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};
use utoipa::ToSchema;

use crate::error::{Error, Result};

/// Extraction service connection settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ExtractionConfig {
    /// Upload endpoint (default: "http://127.0.0.1:8000/upload-ocr")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Multipart field carrying the file bytes (default: "file")
    #[serde(default = "default_file_field")]
    pub file_field: String,

    /// OCR languages passed as the `languages` query parameter (default: "hin+eng")
    ///
    /// `None` omits the parameter and lets the service pick.
    #[serde(default = "default_languages")]
    pub languages: Option<String>,

    /// Per-call timeout (default: 120 seconds)
    ///
    /// Expiry is recorded on the item as a transport error.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Value sent in the `X-Api-Key` header (None = no header)
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            file_field: default_file_field(),
            languages: default_languages(),
            timeout: default_request_timeout(),
            api_key: None,
        }
    }
}

/// What to do when a batch is submitted while another is draining
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Refuse the new batch with `Error::BatchInProgress`
    #[default]
    Reject,
    /// Cancel the draining batch between items, then publish the new one
    Replace,
}

/// Queue behavior settings
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueConfig {
    /// Recognized file extensions, without the dot (default: pdf, png, jpg, jpeg, tiff)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Maximum extraction calls in flight (default: 1 = strictly sequential)
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,

    /// Behavior for submissions while a batch is draining (default: reject)
    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Event channel capacity per subscriber (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
            busy_policy: BusyPolicy::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Retry configuration for transient item failures
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single-shot uploads: a failed call is final
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Optional API key required in the `X-Api-Key` header
    #[serde(default)]
    pub api_key: Option<String>,

    /// Enable CORS (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins ("*" = any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Maximum accepted request body for batch uploads (default: 50 MiB per file x 20)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for UploadCoordinator
///
/// Fields are organized into sub-configs:
/// - [`extraction`](ExtractionConfig): where and how files are uploaded
/// - [`queue`](QueueConfig): filtering, concurrency, busy policy
/// - [`retry`](RetryConfig): per-item retry with backoff
/// - [`api`](ApiConfig): embedding REST API
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Extraction service settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Retry settings for item uploads
    #[serde(default)]
    pub retry: RetryConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = url::Url::parse(&self.extraction.endpoint) {
            return Err(Error::Config {
                message: format!(
                    "invalid extraction endpoint '{}': {}",
                    self.extraction.endpoint, e
                ),
                key: Some("extraction.endpoint".to_string()),
            });
        }
        if self.extraction.file_field.is_empty() {
            return Err(Error::Config {
                message: "multipart file field must not be empty".to_string(),
                key: Some("extraction.file_field".to_string()),
            });
        }
        if self.extraction.timeout.is_zero() {
            return Err(Error::Config {
                message: "extraction timeout must be greater than zero".to_string(),
                key: Some("extraction.timeout".to_string()),
            });
        }
        if self.queue.allowed_extensions.is_empty() {
            return Err(Error::Config {
                message: "at least one allowed extension is required".to_string(),
                key: Some("queue.allowed_extensions".to_string()),
            });
        }
        if self.queue.max_concurrent_uploads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_uploads must be at least 1".to_string(),
                key: Some("queue.max_concurrent_uploads".to_string()),
            });
        }
        if self.queue.event_buffer == 0 {
            return Err(Error::Config {
                message: "event_buffer must be at least 1".to_string(),
                key: Some("queue.event_buffer".to_string()),
            });
        }
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&self.retry.backoff_multiplier) {
            return Err(Error::Config {
                message: format!(
                    "backoff_multiplier must be between 1.0 and {}",
                    MAX_BACKOFF_MULTIPLIER
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

/// Largest accepted `retry.backoff_multiplier`
const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

// Default value functions
fn default_endpoint() -> String {
    "http://127.0.0.1:8000/upload-ocr".to_string()
}

fn default_file_field() -> String {
    "file".to_string()
}

fn default_languages() -> Option<String> {
    Some("hin+eng".to_string())
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_allowed_extensions() -> Vec<String> {
    vec![
        "pdf".into(),
        "png".into(),
        "jpg".into(),
        "jpeg".into(),
        "tiff".into(),
    ]
}

fn default_max_concurrent_uploads() -> usize {
    1
}

fn default_event_buffer() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024 * 20
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.queue.allowed_extensions,
            vec!["pdf", "png", "jpg", "jpeg", "tiff"]
        );
        assert_eq!(config.queue.max_concurrent_uploads, 1);
        assert_eq!(config.queue.busy_policy, BusyPolicy::Reject);
        assert_eq!(config.extraction.file_field, "file");
        assert_eq!(config.extraction.languages.as_deref(), Some("hin+eng"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "extraction": {"endpoint": "http://ocr.internal:9000/upload-ocr", "timeout": 15},
                "queue": {"busy_policy": "replace"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.extraction.timeout, Duration::from_secs(15));
        assert_eq!(config.extraction.file_field, "file");
        assert_eq!(config.queue.busy_policy, BusyPolicy::Replace);
        assert_eq!(config.queue.max_concurrent_uploads, 1);
        assert_eq!(config.retry.max_attempts, 2);
    }

    #[test]
    fn test_duration_round_trip_in_seconds() {
        let json = serde_json::to_value(RetryConfig::default()).unwrap();
        assert_eq!(json["initial_delay"], 1);
        assert_eq!(json["max_delay"], 30);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = Config::default();
        config.extraction.endpoint = "not a url".into();
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("extraction.endpoint")),
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.queue.max_concurrent_uploads = 0;
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("queue.max_concurrent_uploads"))
            }
            other => panic!("expected config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.queue.allowed_extensions.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_backoff_multiplier() {
        for multiplier in [0.5, 1e30, f64::INFINITY, f64::NAN] {
            let mut config = Config::default();
            config.retry.backoff_multiplier = multiplier;
            match config.validate() {
                Err(Error::Config { key, .. }) => {
                    assert_eq!(key.as_deref(), Some("retry.backoff_multiplier"))
                }
                other => panic!("multiplier {multiplier} accepted: {other:?}"),
            }
        }

        let mut config = Config::default();
        config.retry.backoff_multiplier = 10.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_disabled() {
        let retry = RetryConfig::disabled();
        assert_eq!(retry.max_attempts, 0);
        assert_eq!(retry.backoff_multiplier, 2.0);
    }
}
