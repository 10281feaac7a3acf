//! Demo provider used when no credential is configured.

use async_trait::async_trait;

use super::{DocumentProvider, ProviderError, RemoteDocument};
use crate::item::Item;
use crate::period::Period;

/// Provider that never reaches the network.
///
/// Every request is answered as access-denied, so the fetch client hands back
/// labeled fallback artifacts and jobs still run end to end.
#[derive(Debug, Default)]
pub struct DemoProvider;

impl DemoProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentProvider for DemoProvider {
    fn name(&self) -> &str {
        "demo"
    }

    async fn fetch_document(
        &self,
        _item: &Item,
        _period: Period,
    ) -> Result<RemoteDocument, ProviderError> {
        Err(ProviderError::AccessDenied(
            "demo mode: no provider credential configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::provider::{FallbackReason, FetchClient, Provenance};

    #[tokio::test]
    async fn test_demo_mode_produces_fallback_artifacts() {
        let client = FetchClient::new(Arc::new(DemoProvider::new()), Duration::from_secs(1));
        let item = Item::parse("NVDA").unwrap();
        let artifact = client
            .fetch(&item, Period::new(2025, 2).unwrap())
            .await
            .unwrap();

        match artifact.provenance {
            Provenance::Fallback { reason, detail } => {
                assert_eq!(reason, FallbackReason::AccessDenied);
                assert!(detail.contains("demo mode"));
            }
            other => panic!("expected fallback, got {:?}", other),
        }
    }
}
