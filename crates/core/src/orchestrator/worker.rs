//! Per-item worker: cache check, sequential candidate search, retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::retry::BackoffPolicy;
use crate::cache::{ArtifactCache, ArtifactSink, SetOutcome};
use crate::item::Item;
use crate::job::ItemOutcome;
use crate::metrics;
use crate::period::Period;
use crate::provider::{Artifact, ArtifactKey, FetchClient, FetchError};

/// How a worker left its item.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// The item reached a terminal outcome.
    Finished(ItemOutcome),
    /// Stopped by pause or cancel before the item was settled.
    Interrupted(Item),
}

/// Shared state for all workers of one orchestrator.
#[derive(Clone)]
pub struct ItemWorker {
    fetch_client: FetchClient,
    cache: Arc<ArtifactCache>,
    sink: Option<Arc<dyn ArtifactSink>>,
    backoff: BackoffPolicy,
}

impl ItemWorker {
    pub fn new(
        fetch_client: FetchClient,
        cache: Arc<ArtifactCache>,
        sink: Option<Arc<dyn ArtifactSink>>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            fetch_client,
            cache,
            sink,
            backoff,
        }
    }

    /// Most recent candidate that is already cached.
    fn cached_candidate(&self, item: &Item, candidates: &[Period]) -> Option<Period> {
        candidates
            .iter()
            .copied()
            .find(|period| self.cache.has(&ArtifactKey::new(item.clone(), *period)))
    }

    /// Settle one item.
    ///
    /// Candidates are tried strictly in order, one at a time. `NotFound`
    /// advances to the next candidate; rate-limited and transient failures
    /// retry the same candidate until the backoff schedule runs out, after
    /// which the candidate counts as not found.
    pub async fn process(
        &self,
        job_id: &str,
        item: Item,
        candidates: Vec<Period>,
        force_refresh: bool,
        interrupted: &AtomicBool,
    ) -> WorkerOutcome {
        if !force_refresh {
            if let Some(period) = self.cached_candidate(&item, &candidates) {
                debug!(job_id, %item, %period, "Already cached, skipping");
                return WorkerOutcome::Finished(ItemOutcome::skipped(item, period));
            }
        }

        if candidates.is_empty() {
            return WorkerOutcome::Finished(ItemOutcome::failed(item, "no candidate periods", 0));
        }

        let mut attempts: u32 = 0;
        let mut last_error = String::new();

        for period in candidates {
            if interrupted.load(Ordering::SeqCst) {
                debug!(job_id, %item, "Interrupted before next candidate");
                return WorkerOutcome::Interrupted(item);
            }

            let mut retry: u32 = 0;
            loop {
                attempts += 1;
                debug!(job_id, %item, %period, attempt = attempts, "Fetching");

                match self.fetch_client.fetch(&item, period).await {
                    Ok(artifact) => {
                        let provenance = artifact.provenance.clone();
                        self.store(artifact, force_refresh);
                        info!(
                            job_id,
                            %item,
                            %period,
                            fallback = provenance.is_fallback(),
                            "Item acquired"
                        );
                        return WorkerOutcome::Finished(ItemOutcome::success(
                            item, period, provenance, attempts,
                        ));
                    }
                    Err(FetchError::NotFound) => {
                        last_error = format!("not found for {}", period);
                        break;
                    }
                    Err(err) => {
                        let retry_after = match &err {
                            FetchError::RateLimited { retry_after_ms } => *retry_after_ms,
                            _ => None,
                        };
                        match self.backoff.delay(retry, retry_after) {
                            Some(delay) => {
                                warn!(
                                    job_id,
                                    %item,
                                    %period,
                                    attempt = attempts,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %err,
                                    "Retrying after backoff"
                                );
                                metrics::RETRIES.with_label_values(&[err.label()]).inc();
                                tokio::time::sleep(delay).await;
                                retry += 1;
                            }
                            None => {
                                warn!(
                                    job_id,
                                    %item,
                                    %period,
                                    error = %err,
                                    "Retries exhausted, trying next candidate"
                                );
                                last_error =
                                    format!("{} for {} after {} retries", err, period, retry);
                                break;
                            }
                        }
                    }
                }
            }
        }

        WorkerOutcome::Finished(ItemOutcome::failed(item, last_error, attempts))
    }

    /// Write an artifact to the cache and, when it was stored, to the sink.
    fn store(&self, artifact: Artifact, force_refresh: bool) {
        let sink_copy = self.sink.as_ref().map(|_| artifact.clone());
        let outcome = self.cache.set(artifact, force_refresh);
        if outcome == SetOutcome::Unchanged {
            return;
        }
        if let (Some(sink), Some(artifact)) = (&self.sink, sink_copy) {
            if let Err(e) = sink.upsert(&artifact) {
                warn!(
                    item = %artifact.item,
                    period = %artifact.period,
                    "Artifact sink write failed: {}",
                    e
                );
            }
        }
    }
}
