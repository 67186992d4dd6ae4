//! Batch draining.
//!
//! Items are started in queue order with at most `queue.max_concurrent_uploads`
//! extraction calls in flight. Every status change is published before the
//! matching event is emitted, so a subscriber reacting to an event always
//! finds the snapshot at least as new as the event.

use chrono::Utc;
use futures::StreamExt;

use crate::error::ItemError;
use crate::retry::retry_with_backoff;
use crate::types::{
    BatchId, BatchPhase, BatchSummary, Event, ExtractionResult, ItemStatus, SourceFile,
};

use super::UploadCoordinator;
use super::batch::PreparedBatch;

impl UploadCoordinator {
    /// Drain a published batch, then release the drain lock
    pub(crate) async fn drain(&self, batch: PreparedBatch) -> BatchSummary {
        let PreparedBatch {
            batch_id,
            sources,
            cancel_token,
            _drain_guard,
            ..
        } = batch;

        self.update_snapshot(batch_id, |snapshot| snapshot.phase = BatchPhase::Draining);

        let limit = self.config.queue.max_concurrent_uploads.max(1);
        futures::stream::iter(sources.into_iter().enumerate())
            .for_each_concurrent(limit, |(item_id, source)| {
                let cancel_token = cancel_token.clone();
                async move {
                    // Cancellation is honored between items; in-flight calls run to completion
                    if cancel_token.is_cancelled() {
                        return;
                    }
                    self.process_item(batch_id, item_id, &source).await;
                }
            })
            .await;

        let summary = self.summarize(batch_id, cancel_token.is_cancelled());
        let phase = if summary.cancelled {
            BatchPhase::Cancelled
        } else {
            BatchPhase::Complete
        };
        self.update_snapshot(batch_id, |snapshot| snapshot.phase = phase);

        if summary.cancelled {
            tracing::info!(
                batch_id = batch_id.get(),
                attempted = summary.attempted,
                skipped = summary.skipped,
                "Batch cancelled"
            );
            self.emit_event(Event::BatchCancelled {
                batch_id,
                attempted: summary.attempted,
                skipped: summary.skipped,
            });
        } else {
            tracing::info!(
                batch_id = batch_id.get(),
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Batch complete"
            );
            self.emit_event(Event::BatchComplete {
                batch_id,
                attempted: summary.attempted,
                succeeded: summary.succeeded,
                failed: summary.failed,
            });
        }

        // Clear the active marker before the guard drops so a new batch never sees it cleared
        {
            let mut active = self.batch_state.active.lock().await;
            if active.as_ref().is_some_and(|a| a.id == batch_id) {
                *active = None;
            }
        }

        summary
    }

    /// Run one item through `processing` to a terminal state
    async fn process_item(&self, batch_id: BatchId, item_id: usize, source: &SourceFile) {
        let started = self.update_item(batch_id, item_id, |item| {
            item.status = ItemStatus::Processing;
            item.started_at = Some(Utc::now());
        });
        if !started {
            return;
        }
        self.emit_event(Event::ItemProcessing {
            batch_id,
            item_id,
            name: source.name.clone(),
        });
        tracing::debug!(
            batch_id = batch_id.get(),
            item_id,
            name = %source.name,
            size_bytes = source.size_bytes,
            "Uploading item for extraction"
        );

        let result = retry_with_backoff(
            &self.config.retry,
            || self.attempt_extraction(batch_id, item_id, source),
            |attempt, error| {
                self.emit_event(Event::ItemRetrying {
                    batch_id,
                    item_id,
                    attempt,
                    error: error.to_string(),
                });
            },
        )
        .await;

        match result {
            Ok(result) => self.finish_done(batch_id, item_id, result),
            Err(error) => self.finish_failed(batch_id, item_id, &source.name, error),
        }
    }

    /// One bounded extraction call; the attempt is counted before the call starts
    async fn attempt_extraction(
        &self,
        batch_id: BatchId,
        item_id: usize,
        source: &SourceFile,
    ) -> Result<ExtractionResult, ItemError> {
        self.update_item(batch_id, item_id, |item| item.attempts += 1);

        let timeout = self.config.extraction.timeout;
        match tokio::time::timeout(timeout, self.extractor.extract(source)).await {
            Ok(result) => result,
            Err(_) => Err(ItemError::Timeout(timeout)),
        }
    }

    fn finish_done(&self, batch_id: BatchId, item_id: usize, result: ExtractionResult) {
        self.update_item(batch_id, item_id, |item| {
            item.status = ItemStatus::Done;
            item.document_id = Some(result.doc_id.clone());
            item.finished_at = Some(Utc::now());
        });

        tracing::info!(
            batch_id = batch_id.get(),
            item_id,
            doc_id = %result.doc_id,
            words = result.metadata.word_count,
            pages = result.metadata.page_count,
            "Item extracted"
        );
        self.emit_event(Event::ItemDone {
            batch_id,
            item_id,
            result: Box::new(result),
        });
    }

    fn finish_failed(&self, batch_id: BatchId, item_id: usize, name: &str, error: ItemError) {
        let kind = error.kind();
        let message = error.to_string();
        self.update_item(batch_id, item_id, |item| {
            item.status = ItemStatus::Error;
            item.error_kind = Some(kind);
            item.error = Some(message.clone());
            item.finished_at = Some(Utc::now());
        });

        tracing::warn!(
            batch_id = batch_id.get(),
            item_id,
            name,
            kind = ?kind,
            error = %message,
            "Item failed"
        );
        self.emit_event(Event::ItemFailed {
            batch_id,
            item_id,
            kind,
            error: message,
        });
    }

    /// Tally the published queue of `batch_id`
    fn summarize(&self, batch_id: BatchId, cancel_requested: bool) -> BatchSummary {
        let snapshot = self
            .current_snapshot()
            .filter(|snapshot| snapshot.batch_id == batch_id);
        let (total, succeeded, failed, skipped) = match snapshot {
            Some(s) => (
                s.items.len(),
                s.count(ItemStatus::Done),
                s.count(ItemStatus::Error),
                s.count(ItemStatus::Pending),
            ),
            None => (0, 0, 0, 0),
        };

        BatchSummary {
            batch_id,
            attempted: total - skipped,
            succeeded,
            failed,
            skipped,
            cancelled: cancel_requested && skipped > 0,
        }
    }
}
