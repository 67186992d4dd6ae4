//! Event helpers for integration tests

use doc_intake::{BatchId, Event, UploadCoordinator};
use std::time::Duration;
use tokio::sync::broadcast;

/// Collect events until the batch finishes (completed or cancelled)
///
/// Returns `None` on timeout.
pub async fn collect_until_finished(
    events: &mut broadcast::Receiver<Event>,
    batch_id: BatchId,
    timeout: Duration,
) -> Option<Vec<Event>> {
    tokio::time::timeout(timeout, async {
        let mut collected = Vec::new();
        loop {
            match events.recv().await {
                Ok(event) => {
                    let finished = matches!(
                        &event,
                        Event::BatchComplete { batch_id: id, .. }
                            | Event::BatchCancelled { batch_id: id, .. }
                            if *id == batch_id
                    );
                    collected.push(event);
                    if finished {
                        return collected;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return collected,
            }
        }
    })
    .await
    .ok()
}

/// Wait until the coordinator has released its drain lock
pub async fn wait_until_idle(coordinator: &UploadCoordinator, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        while coordinator.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
