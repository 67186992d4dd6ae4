//! Upload queue coordinator split into focused submodules.
//!
//! The `UploadCoordinator` struct and its methods are organized by concern:
//! - [`batch`] - Filtering, enqueueing and batch submission
//! - [`processor`] - Draining a batch against the extraction service
//! - [`control`] - Cancellation, clearing and shutdown

mod batch;
mod control;
mod processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use batch::filter_supported;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::extraction::{ExtractionService, HttpExtractionService};
use crate::types::{BatchId, Event, QueueItem, QueueSnapshot};

/// The batch currently holding the drain lock
#[derive(Clone, Debug)]
pub(crate) struct ActiveBatch {
    pub(crate) id: BatchId,
    pub(crate) cancel_token: CancellationToken,
}

/// Queue and batch state management
#[derive(Clone)]
pub(crate) struct BatchState {
    /// Published view of the current batch; mutated in place, then watchers are notified
    pub(crate) snapshot_tx: Arc<watch::Sender<Option<QueueSnapshot>>>,
    /// Held for the whole lifetime of a draining batch (one batch at a time)
    pub(crate) drain_lock: Arc<Mutex<()>>,
    /// Identity and cancellation token of the draining batch
    pub(crate) active: Arc<Mutex<Option<ActiveBatch>>>,
    /// Next batch identifier
    pub(crate) next_batch_id: Arc<AtomicU64>,
    /// Flag to indicate whether new batches are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Bumped by every `replace` submission; only the newest waiting submission may drain
    pub(crate) replace_generation: Arc<AtomicU64>,
}

/// Main coordinator instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the queue of the current batch. Observers read it through
/// [`current_snapshot`](Self::current_snapshot), wait for changes with
/// [`watch_snapshots`](Self::watch_snapshots), or follow lifecycle
/// [`Event`]s from [`subscribe`](Self::subscribe).
#[derive(Clone)]
pub struct UploadCoordinator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Extraction service every item is uploaded to
    pub(crate) extractor: Arc<dyn ExtractionService>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Queue and batch state
    pub(crate) batch_state: BatchState,
}

impl UploadCoordinator {
    /// Create a coordinator that uploads to the configured HTTP extraction endpoint
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use doc_intake::{Config, SourceFile, UploadCoordinator};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let coordinator = UploadCoordinator::new(Config::default())?;
    ///
    ///     let files = vec![
    ///         SourceFile::from_path("notice.pdf").await?,
    ///         SourceFile::from_path("annexure.png").await?,
    ///     ];
    ///     let summary = coordinator.process_batch(files).await?;
    ///     println!("{} of {} succeeded", summary.succeeded, summary.attempted);
    ///     Ok(())
    /// }
    /// ```
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let service = HttpExtractionService::new(&config.extraction)?;
        Self::with_service(config, Arc::new(service))
    }

    /// Create a coordinator with a custom extraction service
    pub fn with_service(config: Config, extractor: Arc<dyn ExtractionService>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.queue.event_buffer);
        let (snapshot_tx, _snapshot_rx) = watch::channel(None);

        tracing::info!(
            extractor = extractor.name(),
            max_concurrent_uploads = config.queue.max_concurrent_uploads,
            busy_policy = ?config.queue.busy_policy,
            "Upload coordinator initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            extractor,
            event_tx,
            batch_state: BatchState {
                snapshot_tx: Arc::new(snapshot_tx),
                drain_lock: Arc::new(Mutex::new(())),
                active: Arc::new(Mutex::new(None)),
                next_batch_id: Arc::new(AtomicU64::new(1)),
                accepting_new: Arc::new(AtomicBool::new(true)),
                replace_generation: Arc::new(AtomicU64::new(0)),
            },
        })
    }

    /// Subscribe to batch lifecycle events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than `queue.event_buffer` events
    /// receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Watch the published queue snapshot
    ///
    /// The receiver always holds the latest snapshot and is notified after every
    /// transition; intermediate snapshots may be skipped by slow readers.
    pub fn watch_snapshots(&self) -> watch::Receiver<Option<QueueSnapshot>> {
        self.batch_state.snapshot_tx.subscribe()
    }

    /// The current batch's queue, or `None` before the first batch (or after `clear`)
    pub fn current_snapshot(&self) -> Option<QueueSnapshot> {
        self.batch_state.snapshot_tx.borrow().clone()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Mutate one item of the published queue and notify watchers
    ///
    /// The change is applied only if the published batch is still `batch_id` and
    /// the item's lifecycle allows moving to the status `apply` sets. Returns
    /// whether the change was applied.
    pub(crate) fn update_item(
        &self,
        batch_id: BatchId,
        item_id: usize,
        apply: impl FnOnce(&mut QueueItem),
    ) -> bool {
        let mut applied = false;
        self.batch_state.snapshot_tx.send_if_modified(|snapshot| {
            let Some(snapshot) = snapshot.as_mut() else {
                return false;
            };
            if snapshot.batch_id != batch_id {
                return false;
            }
            let Some(item) = snapshot.items.get_mut(item_id) else {
                return false;
            };

            let mut updated = item.clone();
            apply(&mut updated);
            if updated.status != item.status && !item.status.can_transition_to(updated.status) {
                tracing::warn!(
                    batch_id = batch_id.get(),
                    item_id,
                    from = ?item.status,
                    to = ?updated.status,
                    "Rejected illegal item transition"
                );
                return false;
            }

            *item = updated;
            applied = true;
            true
        });
        applied
    }

    /// Mutate the published snapshot as a whole (phase changes)
    pub(crate) fn update_snapshot(&self, batch_id: BatchId, apply: impl FnOnce(&mut QueueSnapshot)) {
        self.batch_state.snapshot_tx.send_if_modified(|snapshot| match snapshot.as_mut() {
            Some(snapshot) if snapshot.batch_id == batch_id => {
                apply(snapshot);
                true
            }
            _ => false,
        });
    }
}
