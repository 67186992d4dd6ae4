//! Cancellation, clearing and shutdown.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::types::{BatchId, Event};

use super::UploadCoordinator;

impl UploadCoordinator {
    /// Stop the draining batch between items
    ///
    /// Calls already in flight run to completion; items not yet started stay
    /// `pending` and the batch ends in the `cancelled` phase.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveBatch`] when nothing is draining.
    pub async fn cancel_batch(&self) -> Result<BatchId> {
        let active = self.batch_state.active.lock().await;
        match active.as_ref() {
            Some(active) => {
                tracing::info!(batch_id = active.id.get(), "Cancelling batch");
                active.cancel_token.cancel();
                Ok(active.id)
            }
            None => Err(Error::NoActiveBatch),
        }
    }

    /// Drop the published queue of a finished batch
    ///
    /// # Errors
    ///
    /// Returns [`Error::BatchInProgress`] while a batch is draining.
    pub async fn clear(&self) -> Result<()> {
        let _guard = match self.batch_state.drain_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(Error::BatchInProgress(self.active_batch_id().await)),
        };

        if let Some(previous) = self.batch_state.snapshot_tx.send_replace(None) {
            tracing::debug!(batch_id = previous.batch_id.get(), "Cleared queue");
        }
        Ok(())
    }

    /// Whether a batch is currently holding the drain lock
    pub fn is_busy(&self) -> bool {
        self.batch_state.drain_lock.try_lock().is_err()
    }

    /// Stop accepting batches and wait for the draining batch to wind down
    ///
    /// The draining batch is cancelled between items. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.batch_state.accepting_new.store(false, Ordering::SeqCst);

        if let Some(active) = self.batch_state.active.lock().await.as_ref() {
            tracing::info!(batch_id = active.id.get(), "Cancelling draining batch");
            active.cancel_token.cancel();
        }

        // Wait for in-flight calls to settle
        let _guard = self.batch_state.drain_lock.lock().await;

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
