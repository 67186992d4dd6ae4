//! # doc-intake
//!
//! Upload-queue coordinator for OCR document extraction.
//!
//! A caller hands over a batch of files; the coordinator keeps only files with
//! a recognized extension, publishes a queue of per-file items, and uploads
//! the items one by one to an extraction service. Every item moves through
//! `pending → processing → done | error`, and a failed item never stops the
//! rest of the batch.
//!
//! ## Quick Start
//!
//! ```no_run
//! use doc_intake::{Config, Event, SourceFile, UploadCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.extraction.endpoint = "http://ocr.internal:8000/upload-ocr".to_string();
//!
//!     let coordinator = UploadCoordinator::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             if let Event::ItemDone { result, .. } = event {
//!                 println!("{}: {} words", result.doc_id, result.metadata.word_count);
//!             }
//!         }
//!     });
//!
//!     let files = vec![
//!         SourceFile::from_path("scans/circular.pdf").await?,
//!         SourceFile::from_path("scans/page-2.jpg").await?,
//!     ];
//!     let summary = coordinator.process_batch(files).await?;
//!     println!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Upload queue coordinator (decomposed into focused submodules)
pub mod coordinator;
/// Error types
pub mod error;
/// Extraction service client
pub mod extraction;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{BusyPolicy, Config};
pub use coordinator::UploadCoordinator;
pub use error::{ApiError, Error, ErrorDetail, ItemError, Result, ToHttpStatus, ValidationError};
pub use extraction::{ExtractionService, HttpExtractionService};
pub use types::{
    BatchId, BatchPhase, BatchSummary, Event, ExtractionResult, ItemErrorKind, ItemStatus,
    QueueItem, QueueSnapshot, SourceFile,
};

/// Run the coordinator until a termination signal arrives, then shut it down.
///
/// - **Unix:** SIGTERM or SIGINT.
/// - **Other platforms:** Ctrl+C.
///
/// The draining batch (if any) is cancelled between items and the call
/// returns once its in-flight upload has settled.
///
/// # Example
///
/// ```no_run
/// use doc_intake::{Config, UploadCoordinator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let coordinator = UploadCoordinator::new(Config::default())?;
///
///     let api = tokio::spawn(doc_intake::api::start_api_server(
///         std::sync::Arc::new(coordinator.clone()),
///         coordinator.get_config(),
///     ));
///
///     run_with_shutdown(coordinator).await?;
///     api.abort();
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(coordinator: UploadCoordinator) -> Result<()> {
    wait_for_signal().await;
    coordinator.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments; fall back to Ctrl+C
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            wait_for_ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
        _ = wait_for_ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received SIGINT signal (Ctrl+C)"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            // Keep running without a signal source
            std::future::pending::<()>().await;
        }
    }
}
