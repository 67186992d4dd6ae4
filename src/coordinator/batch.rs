//! Batch intake: extension filtering, enqueueing and submission.

use std::sync::atomic::Ordering;

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::config::BusyPolicy;
use crate::error::{Error, Result, ValidationError};
use crate::types::{BatchId, BatchPhase, BatchSummary, Event, QueueItem, QueueSnapshot, SourceFile};
use crate::utils::has_allowed_extension;

use super::{ActiveBatch, UploadCoordinator};

/// A published batch that owns the drain lock until it has been drained
pub(crate) struct PreparedBatch {
    pub(crate) batch_id: BatchId,
    pub(crate) sources: Vec<SourceFile>,
    pub(crate) rejected: usize,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) _drain_guard: OwnedMutexGuard<()>,
}

/// Identity and intake counts of a batch handed to a background drain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct QueuedBatch {
    pub(crate) batch_id: BatchId,
    /// Files kept by the extension filter
    pub(crate) total: usize,
    /// Files dropped by the extension filter
    pub(crate) rejected: usize,
}

/// Keep only files whose extension is in `allowed`, preserving input order
///
/// Matching is case-insensitive; a name without an extension never matches.
///
/// # Examples
///
/// ```
/// use doc_intake::{SourceFile, coordinator::filter_supported};
///
/// let allowed = vec!["pdf".to_string(), "png".to_string()];
/// let kept = filter_supported(
///     vec![
///         SourceFile::from_bytes("a.pdf", &b"%PDF"[..]),
///         SourceFile::from_bytes("b.docx", &b"PK"[..]),
///         SourceFile::from_bytes("c.PNG", &b"PNG"[..]),
///     ],
///     &allowed,
/// );
/// let names: Vec<_> = kept.iter().map(|f| f.name.as_str()).collect();
/// assert_eq!(names, ["a.pdf", "c.PNG"]);
/// ```
pub fn filter_supported(inputs: Vec<SourceFile>, allowed: &[String]) -> Vec<SourceFile> {
    inputs
        .into_iter()
        .filter(|file| {
            let keep = has_allowed_extension(&file.name, allowed);
            if !keep {
                tracing::debug!(name = %file.name, "Skipping file with unsupported extension");
            }
            keep
        })
        .collect()
}

impl UploadCoordinator {
    /// Submit a batch and drain it in the background
    ///
    /// Returns as soon as the batch is published. Progress is reported through
    /// [`subscribe`](Self::subscribe) and [`watch_snapshots`](Self::watch_snapshots).
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if no input has an allowed extension (nothing is published)
    /// - [`Error::BatchInProgress`] if a batch is draining and the busy policy is `reject`
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    ///
    /// With the `replace` busy policy this waits for the draining batch to stop
    /// between items before publishing the new one.
    pub async fn submit_batch(&self, inputs: Vec<SourceFile>) -> Result<BatchId> {
        Ok(self.enqueue_batch(inputs).await?.batch_id)
    }

    /// [`submit_batch`](Self::submit_batch), also reporting the filter counts
    pub(crate) async fn enqueue_batch(&self, inputs: Vec<SourceFile>) -> Result<QueuedBatch> {
        let batch = self.prepare_batch(inputs).await?;
        let queued = QueuedBatch {
            batch_id: batch.batch_id,
            total: batch.sources.len(),
            rejected: batch.rejected,
        };

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.drain(batch).await;
        });

        Ok(queued)
    }

    /// Submit a batch and wait until it has been drained
    ///
    /// Per-item failures are recorded on the items and counted in the summary;
    /// they never fail the call. Errors are the same as for
    /// [`submit_batch`](Self::submit_batch).
    ///
    /// The batch drains on its own task: dropping this future stops the wait,
    /// not the batch.
    pub async fn process_batch(&self, inputs: Vec<SourceFile>) -> Result<BatchSummary> {
        let batch = self.prepare_batch(inputs).await?;
        let batch_id = batch.batch_id;

        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.drain(batch).await })
            .await
            .map_err(|e| {
                tracing::error!(batch_id = batch_id.get(), error = %e, "Batch drain task failed");
                Error::Other(format!("drain of batch {} failed: {}", batch_id, e))
            })
    }

    /// Filter, claim the drain lock, and publish a fresh queue
    ///
    /// Nothing observable changes unless this returns `Ok`.
    pub(crate) async fn prepare_batch(&self, inputs: Vec<SourceFile>) -> Result<PreparedBatch> {
        if !self.batch_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let received = inputs.len();
        let sources = filter_supported(inputs, &self.config.queue.allowed_extensions);
        if sources.is_empty() {
            tracing::warn!(received, "Rejected batch with no supported files");
            return Err(ValidationError::NoSupportedFiles {
                received,
                allowed: self.config.queue.allowed_extensions.join(", "),
            }
            .into());
        }
        let rejected = received - sources.len();

        let (drain_guard, replace_ticket) = self.claim_drain_lock().await?;

        // Shutdown may have started while waiting on a replaced batch
        if !self.batch_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let batch_id = BatchId(self.batch_state.next_batch_id.fetch_add(1, Ordering::SeqCst));
        let cancel_token = CancellationToken::new();
        {
            let mut active = self.batch_state.active.lock().await;
            *active = Some(ActiveBatch {
                id: batch_id,
                cancel_token: cancel_token.clone(),
            });

            // A newer `replace` submission arrived while this one waited for the lock
            let generation = self.batch_state.replace_generation.load(Ordering::SeqCst);
            if replace_ticket.is_some_and(|ticket| ticket != generation) {
                tracing::info!(
                    batch_id = batch_id.get(),
                    "Batch superseded before draining; cancelling"
                );
                cancel_token.cancel();
            }
        }

        let snapshot = QueueSnapshot {
            batch_id,
            phase: BatchPhase::Enqueued,
            items: sources
                .iter()
                .enumerate()
                .map(|(id, source)| QueueItem::new(id, source))
                .collect(),
            created_at: Utc::now(),
        };
        self.batch_state.snapshot_tx.send_replace(Some(snapshot));

        tracing::info!(
            batch_id = batch_id.get(),
            total = sources.len(),
            rejected,
            "Batch queued"
        );
        self.emit_event(Event::BatchQueued {
            batch_id,
            total: sources.len(),
            rejected,
        });

        Ok(PreparedBatch {
            batch_id,
            sources,
            rejected,
            cancel_token,
            _drain_guard: drain_guard,
        })
    }

    /// Take the drain lock according to the configured busy policy
    ///
    /// Under `replace` the returned ticket identifies this submission among
    /// other waiting replacements; the batch is cancelled on publish unless
    /// the ticket is still the newest.
    async fn claim_drain_lock(&self) -> Result<(OwnedMutexGuard<()>, Option<u64>)> {
        let lock = self.batch_state.drain_lock.clone();
        match self.config.queue.busy_policy {
            BusyPolicy::Reject => match lock.try_lock_owned() {
                Ok(guard) => Ok((guard, None)),
                Err(_) => {
                    let active = self.active_batch_id().await;
                    tracing::debug!(batch_id = active.get(), "Rejected submission while busy");
                    Err(Error::BatchInProgress(active))
                }
            },
            BusyPolicy::Replace => {
                // Taken under the `active` lock so a batch publishing concurrently
                // either sees the new ticket or is cancelled here
                let ticket = {
                    let active = self.batch_state.active.lock().await;
                    let ticket = self
                        .batch_state
                        .replace_generation
                        .fetch_add(1, Ordering::SeqCst)
                        + 1;
                    if let Some(active) = active.as_ref() {
                        tracing::info!(
                            batch_id = active.id.get(),
                            "Replacing draining batch; cancelling remaining items"
                        );
                        active.cancel_token.cancel();
                    }
                    ticket
                };
                Ok((lock.lock_owned().await, Some(ticket)))
            }
        }
    }

    /// Identity of the batch holding the drain lock
    ///
    /// Falls back to the published snapshot while a finishing batch is
    /// releasing the lock.
    pub(crate) async fn active_batch_id(&self) -> BatchId {
        if let Some(active) = self.batch_state.active.lock().await.as_ref() {
            return active.id;
        }
        self.current_snapshot()
            .map(|s| s.batch_id)
            .unwrap_or(BatchId(0))
    }
}
