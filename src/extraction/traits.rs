//! The extraction service seam

use async_trait::async_trait;

use crate::error::ItemError;
use crate::types::{ExtractionResult, SourceFile};

/// External collaborator that turns a file payload into extracted text and metadata
///
/// The coordinator only needs success or failure from a call; the decoded
/// [`ExtractionResult`] is forwarded to subscribers for display.
///
/// # Examples
///
/// ```no_run
/// use doc_intake::extraction::{ExtractionService, HttpExtractionService};
/// use doc_intake::config::ExtractionConfig;
/// use doc_intake::SourceFile;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = HttpExtractionService::new(&ExtractionConfig::default())?;
/// let file = SourceFile::from_path("circular.pdf").await?;
/// let result = service.extract(&file).await?;
/// println!("{} words", result.metadata.word_count);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Upload one file and wait for its extraction result
    async fn extract(&self, file: &SourceFile) -> Result<ExtractionResult, ItemError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
