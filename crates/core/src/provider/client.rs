//! Fetch client: one bounded call per (item, period).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::{Artifact, DocumentProvider, FallbackReason, FetchError, ProviderError};
use crate::item::Item;
use crate::metrics;
use crate::period::Period;

/// Wraps a [`DocumentProvider`] with a hard timeout and outcome classification.
///
/// Access-denied and timed-out calls are answered with a fallback artifact
/// instead of an error. The client never touches the artifact cache.
#[derive(Clone)]
pub struct FetchClient {
    provider: Arc<dyn DocumentProvider>,
    timeout: Duration,
}

impl FetchClient {
    pub fn new(provider: Arc<dyn DocumentProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the document for `item` in `period`.
    pub async fn fetch(&self, item: &Item, period: Period) -> Result<Artifact, FetchError> {
        let started = Instant::now();

        let raw = match tokio::time::timeout(
            self.timeout,
            self.provider.fetch_document(item, period),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        metrics::FETCH_DURATION
            .with_label_values(&[])
            .observe(started.elapsed().as_secs_f64());

        let outcome = match raw {
            Ok(document) => Ok(Artifact::live(
                item.clone(),
                period,
                document.payload,
                self.provider.name(),
            )),
            Err(ProviderError::NotFound) => Err(FetchError::NotFound),
            Err(ProviderError::RateLimited { retry_after_ms }) => {
                Err(FetchError::RateLimited { retry_after_ms })
            }
            Err(ProviderError::Transient(msg)) => Err(FetchError::Transient(msg)),
            Err(ProviderError::AccessDenied(detail)) => {
                warn!(%item, %period, %detail, "Access denied, substituting fallback artifact");
                Ok(Artifact::fallback(
                    item.clone(),
                    period,
                    FallbackReason::AccessDenied,
                    &detail,
                ))
            }
            Err(ProviderError::Timeout) => {
                let detail = format!("no response within {}ms", self.timeout.as_millis());
                warn!(%item, %period, %detail, "Fetch timed out, substituting fallback artifact");
                Ok(Artifact::fallback(
                    item.clone(),
                    period,
                    FallbackReason::Timeout,
                    &detail,
                ))
            }
        };

        let label = match &outcome {
            Ok(artifact) => match &artifact.provenance {
                super::Provenance::Live { .. } => "live",
                super::Provenance::Fallback {
                    reason: FallbackReason::AccessDenied,
                    ..
                } => "fallback_access_denied",
                super::Provenance::Fallback {
                    reason: FallbackReason::Timeout,
                    ..
                } => "fallback_timeout",
            },
            Err(e) => e.label(),
        };
        metrics::FETCH_ATTEMPTS.with_label_values(&[label]).inc();
        debug!(%item, %period, outcome = label, "Fetch finished");

        outcome
    }
}
