//! Mock document provider for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::item::Item;
use crate::period::Period;
use crate::provider::{ArtifactKey, DocumentProvider, ProviderError, RemoteDocument};

/// One scripted provider answer.
#[derive(Debug, Clone)]
pub struct MockResponse {
    result: Result<String, ProviderError>,
    delay: Option<Duration>,
}

impl MockResponse {
    /// Answer with a document.
    pub fn document(payload: impl Into<String>) -> Self {
        Self {
            result: Ok(payload.into()),
            delay: None,
        }
    }

    /// Answer with an error classification.
    pub fn error(error: ProviderError) -> Self {
        Self {
            result: Err(error),
            delay: None,
        }
    }

    /// Wait before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A recorded fetch for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub item: Item,
    pub period: Period,
    pub timestamp: Instant,
}

/// Mock implementation of the DocumentProvider trait.
///
/// Provides controllable behavior for testing:
/// - Scripted responses per (item, period); the last scripted response
///   repeats, unscripted keys answer `NotFound`
/// - Records every call for assertions
/// - Tracks the high-water mark of concurrently running calls
///
/// # Example
///
/// ```rust,ignore
/// use harvester_core::testing::{MockProvider, MockResponse, fixtures};
///
/// let provider = MockProvider::new();
/// provider.script(
///     &fixtures::item("AAPL"),
///     fixtures::period(2025, 1),
///     vec![MockResponse::document("10-Q body")],
/// );
///
/// // ... run a job ...
///
/// assert_eq!(provider.calls_for(&fixtures::item("AAPL")).len(), 1);
/// assert!(provider.max_in_flight() <= 3);
/// ```
pub struct MockProvider {
    scripts: Mutex<HashMap<ArtifactKey, VecDeque<MockResponse>>>,
    calls: Mutex<Vec<RecordedFetch>>,
    default_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("scripts", &"<scripts>")
            .field("calls", &self.call_count())
            .field("max_in_flight", &self.max_in_flight())
            .finish()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            default_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Script the answers for one (item, period), replacing any previous script.
    pub fn script(&self, item: &Item, period: Period, responses: Vec<MockResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(ArtifactKey::new(item.clone(), period), responses.into());
    }

    /// Delay applied to every response without its own delay.
    pub fn set_default_delay(&self, delay: Duration) {
        *self.default_delay.lock().unwrap() = Some(delay);
    }

    /// All recorded calls, in call order.
    pub fn calls(&self) -> Vec<RecordedFetch> {
        self.calls.lock().unwrap().clone()
    }

    /// Periods requested for `item`, in call order.
    pub fn calls_for(&self, item: &Item) -> Vec<Period> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| &call.item == item)
            .map(|call| call.period)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, key: &ArtifactKey) -> MockResponse {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }
}

fn not_found() -> MockResponse {
    MockResponse::error(ProviderError::NotFound)
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_document(
        &self,
        item: &Item,
        period: Period,
    ) -> Result<RemoteDocument, ProviderError> {
        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);

        self.calls.lock().unwrap().push(RecordedFetch {
            item: item.clone(),
            period,
            timestamp: Instant::now(),
        });

        let response = self.next_response(&ArtifactKey::new(item.clone(), period));
        let delay = response.delay.or(*self.default_delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        response
            .result
            .map(|payload| RemoteDocument { payload })
    }
}
