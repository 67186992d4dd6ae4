//! Shared test helpers for creating UploadCoordinator instances in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, broadcast};

use crate::config::{BusyPolicy, Config, RetryConfig};
use crate::coordinator::UploadCoordinator;
use crate::error::ItemError;
use crate::extraction::ExtractionService;
use crate::types::{DocumentMetadata, Event, ExtractionResult, SourceFile};

/// Scripted outcome of one extraction call
#[derive(Clone, Debug)]
pub(crate) enum Outcome {
    /// Succeed with a result derived from the file name
    Success,
    /// Fail with the given HTTP status
    Status(u16),
    /// Answer 200 with an undecodable body
    Malformed,
    /// Never answer
    Hang,
}

/// In-memory extraction service with per-file scripted outcomes
///
/// Files without a script succeed. Each call pops the next outcome for the
/// file name; the last outcome is reused once the script runs out.
pub(crate) struct ScriptedExtractor {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedExtractor {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::from_millis(5),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Script the outcomes of successive calls for `name`
    pub(crate) fn script(self, name: &str, outcomes: Vec<Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(name.to_string(), outcomes.into());
        self
    }

    /// Make every call take at least `delay`
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make every call wait for a permit before answering (permits are consumed)
    pub(crate) fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// File names in call order (retries included)
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneous calls observed
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, name: &str) -> Outcome {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(name) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script.front().cloned().unwrap_or(Outcome::Success),
            None => Outcome::Success,
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExtractionService for ScriptedExtractor {
    async fn extract(&self, file: &SourceFile) -> Result<ExtractionResult, ItemError> {
        self.calls.lock().unwrap().push(file.name.clone());
        let outcome = self.next_outcome(&file.name);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        match outcome {
            Outcome::Success => Ok(sample_result(&file.name)),
            Outcome::Status(status) => Err(ItemError::Transport {
                status: Some(status),
                message: format!("service answered {status}"),
                transient: crate::error::is_transient_status(status),
            }),
            Outcome::Malformed => Err(ItemError::Decode("expected value at line 1".into())),
            Outcome::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Extraction result the scripted service returns for `name`
pub(crate) fn sample_result(name: &str) -> ExtractionResult {
    ExtractionResult {
        doc_id: format!("doc-{name}"),
        filename: Some(name.to_string()),
        text: format!("text of {name}"),
        metadata: DocumentMetadata {
            page_count: 1,
            word_count: 3,
            language: Some("hin+eng".into()),
            has_handwriting: false,
        },
        confidence: None,
        category: None,
    }
}

/// Config with retries disabled and a short timeout
pub(crate) fn test_config() -> Config {
    let mut config = Config::default();
    config.retry = RetryConfig::disabled();
    config.extraction.timeout = Duration::from_secs(5);
    config
}

/// Config with fast, jitter-free retries
pub(crate) fn retrying_config(max_attempts: u32) -> Config {
    let mut config = test_config();
    config.retry = RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Config using the `replace` busy policy
pub(crate) fn replacing_config() -> Config {
    let mut config = test_config();
    config.queue.busy_policy = BusyPolicy::Replace;
    config
}

/// Build a coordinator around a scripted extractor; the extractor handle is returned for inspection
pub(crate) fn create_test_coordinator(
    config: Config,
    extractor: ScriptedExtractor,
) -> (UploadCoordinator, Arc<ScriptedExtractor>) {
    let extractor = Arc::new(extractor);
    let coordinator = UploadCoordinator::with_service(config, extractor.clone()).unwrap();
    (coordinator, extractor)
}

/// In-memory source file with a few bytes of content
pub(crate) fn file(name: &str) -> SourceFile {
    SourceFile::from_bytes(name, format!("content of {name}").into_bytes())
}

/// Wait (bounded) for the first event matching `pred`
pub(crate) async fn wait_for_event<F>(rx: &mut broadcast::Receiver<Event>, pred: F) -> Event
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
