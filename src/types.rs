//! Core types for doc-intake

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use crate::utils::format_size;

/// Identifier of a submitted batch, monotonic per coordinator
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl BatchId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BatchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-item status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Enqueued, not started yet
    Pending,
    /// Extraction call in flight
    Processing,
    /// Extraction succeeded
    Done,
    /// Extraction failed
    Error,
}

impl ItemStatus {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Done | ItemStatus::Error)
    }

    /// Whether `self -> next` is an allowed lifecycle step
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Processing)
                | (ItemStatus::Processing, ItemStatus::Done)
                | (ItemStatus::Processing, ItemStatus::Error)
        )
    }
}

/// Classification of an item failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    /// Network failure, non-success status, or timeout
    Transport,
    /// Success status with an uninterpretable body
    Decode,
}

/// Batch lifecycle phase
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    /// Published, no item started yet
    Enqueued,
    /// Items are being processed
    Draining,
    /// Every item reached a terminal state
    Complete,
    /// Stopped between items before every item was attempted
    Cancelled,
}

/// Where a source file's bytes live
#[derive(Clone, Debug)]
pub enum Payload {
    /// Bytes already in memory (shared, never copied by the coordinator)
    Memory(Bytes),
    /// File on disk, read when its upload starts
    Path(PathBuf),
}

/// Caller-owned handle to one file of a batch
///
/// Cloning is cheap: in-memory payloads are reference counted.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Display name, also used to derive the extension
    pub name: String,
    /// Payload length in bytes
    pub size_bytes: u64,
    /// The payload itself
    pub payload: Payload,
}

impl SourceFile {
    /// Create a source file from in-memory bytes
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            payload: Payload::Memory(bytes),
        }
    }

    /// Create a source file backed by a path on disk
    ///
    /// Only the metadata is read here; the content is read when the upload starts.
    pub async fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            size_bytes: metadata.len(),
            payload: Payload::Path(path),
        })
    }

    /// Backing path, when the payload lives on disk
    pub fn path(&self) -> Option<&std::path::Path> {
        match &self.payload {
            Payload::Path(path) => Some(path),
            Payload::Memory(_) => None,
        }
    }

    /// Read the full payload
    pub async fn read(&self) -> std::io::Result<Bytes> {
        match &self.payload {
            Payload::Memory(bytes) => Ok(bytes.clone()),
            Payload::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

/// One file's tracked state within a batch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueItem {
    /// Stable 0-based index within the batch
    pub id: usize,
    /// Display name
    pub name: String,
    /// Payload length in bytes
    pub size_bytes: u64,
    /// Human-readable size, derived once at enqueue time
    pub size_label: String,
    /// Current status
    pub status: ItemStatus,
    /// Extraction calls made so far (retries included)
    pub attempts: u32,
    /// Document identifier assigned by the extraction service (when done)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Failure classification (when errored)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ItemErrorKind>,
    /// Failure message (when errored)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When processing started
    pub started_at: Option<DateTime<Utc>>,
    /// When the item reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub(crate) fn new(id: usize, source: &SourceFile) -> Self {
        Self {
            id,
            name: source.name.clone(),
            size_bytes: source.size_bytes,
            size_label: format_size(source.size_bytes),
            status: ItemStatus::Pending,
            attempts: 0,
            document_id: None,
            error_kind: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Point-in-time view of the current batch
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueSnapshot {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Batch phase
    pub phase: BatchPhase,
    /// Items in processing order
    pub items: Vec<QueueItem>,
    /// When the batch was published
    pub created_at: DateTime<Utc>,
}

impl QueueSnapshot {
    /// Number of items currently in the given status
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Statuses in queue order
    pub fn statuses(&self) -> Vec<ItemStatus> {
        self.items.iter().map(|i| i.status).collect()
    }

    /// Whether every item reached a terminal state
    pub fn is_settled(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
    }
}

/// Outcome of a drained (or cancelled) batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchSummary {
    /// Batch identifier
    pub batch_id: BatchId,
    /// Items that were started (equals the filtered count unless cancelled)
    pub attempted: usize,
    /// Items that finished `done`
    pub succeeded: usize,
    /// Items that finished `error`
    pub failed: usize,
    /// Items never started because the batch was cancelled
    pub skipped: usize,
    /// Whether the batch was cancelled between items
    pub cancelled: bool,
}

/// Document metadata reported by the extraction service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentMetadata {
    /// Number of pages processed
    #[serde(default)]
    pub page_count: u32,
    /// Number of words extracted
    #[serde(default)]
    pub word_count: u64,
    /// Detected language
    #[serde(default)]
    pub language: Option<String>,
    /// Whether handwriting was detected
    #[serde(default)]
    pub has_handwriting: bool,
}

/// OCR confidence summary reported by the extraction service
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConfidenceReport {
    /// Average confidence (0-100)
    #[serde(default)]
    pub overall_confidence: f64,
    /// Quality bucket (excellent, good, fair, poor, unknown)
    #[serde(default)]
    pub quality: Option<String>,
    /// Suggestions for improving extraction
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Decoded success body of an extraction call
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExtractionResult {
    /// Identifier the service assigned to the stored document
    pub doc_id: String,
    /// File name as the service recorded it
    #[serde(default)]
    pub filename: Option<String>,
    /// Extracted text
    pub text: String,
    /// Page/word counts, language, handwriting flag
    #[serde(default)]
    pub metadata: DocumentMetadata,
    /// Confidence report, when provided
    #[serde(default)]
    pub confidence: Option<ConfidenceReport>,
    /// Classified document category, when provided
    #[serde(default)]
    pub category: Option<String>,
}

/// Event emitted during the batch lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was filtered, enqueued and published
    BatchQueued {
        /// Batch ID
        batch_id: BatchId,
        /// Number of enqueued items
        total: usize,
        /// Number of inputs dropped by the extension filter
        rejected: usize,
    },

    /// An item's extraction call is about to start
    ItemProcessing {
        /// Batch ID
        batch_id: BatchId,
        /// Item ID
        item_id: usize,
        /// Item name
        name: String,
    },

    /// An item's call failed and will be retried
    ItemRetrying {
        /// Batch ID
        batch_id: BatchId,
        /// Item ID
        item_id: usize,
        /// Attempt number that failed (1-based)
        attempt: u32,
        /// Error message
        error: String,
    },

    /// An item finished successfully
    ItemDone {
        /// Batch ID
        batch_id: BatchId,
        /// Item ID
        item_id: usize,
        /// Decoded extraction result
        result: Box<ExtractionResult>,
    },

    /// An item finished with an error
    ItemFailed {
        /// Batch ID
        batch_id: BatchId,
        /// Item ID
        item_id: usize,
        /// Failure classification
        kind: ItemErrorKind,
        /// Error message
        error: String,
    },

    /// Every enqueued item reached a terminal state
    BatchComplete {
        /// Batch ID
        batch_id: BatchId,
        /// Number of filtered items attempted
        attempted: usize,
        /// Items that finished `done`
        succeeded: usize,
        /// Items that finished `error`
        failed: usize,
    },

    /// The batch stopped between items
    BatchCancelled {
        /// Batch ID
        batch_id: BatchId,
        /// Items started before cancellation took effect
        attempted: usize,
        /// Items left `pending`
        skipped: usize,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ItemStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Done));
        assert!(Processing.can_transition_to(Error));
        assert!(!Pending.can_transition_to(Done));
        assert!(!Done.can_transition_to(Processing));
        assert!(!Error.can_transition_to(Processing));
        assert!(!Done.can_transition_to(Error));
        assert!(Done.is_terminal() && Error.is_terminal());
        assert!(!Pending.is_terminal() && !Processing.is_terminal());
    }

    #[test]
    fn test_queue_item_derives_size_label_once() {
        let item = QueueItem::new(0, &SourceFile::from_bytes("scan.pdf", vec![0u8; 2048]));
        assert_eq!(item.size_label, "2.0 KB");
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.attempts, 0);
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = Event::BatchComplete {
            batch_id: BatchId(2),
            attempted: 3,
            succeeded: 2,
            failed: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "batch_complete");
        assert_eq!(json["attempted"], 3);
    }

    #[test]
    fn test_extraction_result_tolerates_missing_optional_fields() {
        let result: ExtractionResult =
            serde_json::from_str(r#"{"doc_id":"ab12cd34","text":"hello"}"#).unwrap();
        assert_eq!(result.doc_id, "ab12cd34");
        assert_eq!(result.metadata, DocumentMetadata::default());
        assert!(result.confidence.is_none());
    }

    #[test]
    fn test_extraction_result_full_body() {
        let body = r#"{
            "success": true,
            "doc_id": "9f8e7d6c",
            "filename": "notice.pdf",
            "text": "सूचना / Notice",
            "metadata": {"page_count": 2, "word_count": 120, "language": "hin+eng", "has_handwriting": true},
            "confidence": {"overall_confidence": 87.5, "quality": "good", "recommendations": []},
            "category": "circular"
        }"#;
        let result: ExtractionResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.metadata.page_count, 2);
        assert!(result.metadata.has_handwriting);
        assert_eq!(result.confidence.unwrap().quality.as_deref(), Some("good"));
        assert_eq!(result.category.as_deref(), Some("circular"));
    }

    #[tokio::test]
    async fn test_source_file_from_path_reads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"\x89PNG....").unwrap();

        let source = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(source.name, "page.png");
        assert_eq!(source.size_bytes, 8);

        std::fs::write(&path, b"changed").unwrap();
        assert_eq!(source.read().await.unwrap().as_ref(), b"changed");
    }
}
