//! Types for the document provider and fetch client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::item::Item;
use crate::period::Period;

/// Cache key for an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub item: Item,
    pub period: Period,
}

impl ArtifactKey {
    pub fn new(item: Item, period: Period) -> Self {
        Self { item, period }
    }
}

/// Why a fallback artifact was substituted for a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    AccessDenied,
    Timeout,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::AccessDenied => "access_denied",
            FallbackReason::Timeout => "timeout",
        }
    }
}

/// Where an artifact's payload came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provenance {
    /// Returned by the provider.
    Live { provider: String },
    /// Placeholder produced locally because the provider could not serve it.
    Fallback {
        reason: FallbackReason,
        detail: String,
    },
}

impl Provenance {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::Fallback { .. })
    }
}

/// The fetched payload for one (item, period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub item: Item,
    pub period: Period,
    pub payload: String,
    /// Lowercase hex SHA-256 of `payload`.
    pub sha256: String,
    pub retrieved_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl Artifact {
    pub fn live(item: Item, period: Period, payload: String, provider: &str) -> Self {
        Self {
            sha256: payload_digest(&payload),
            item,
            period,
            payload,
            retrieved_at: Utc::now(),
            provenance: Provenance::Live {
                provider: provider.to_string(),
            },
        }
    }

    /// A clearly labeled placeholder used when the provider denies access or
    /// does not answer in time.
    pub fn fallback(item: Item, period: Period, reason: FallbackReason, detail: &str) -> Self {
        let payload = format!(
            "[FALLBACK:{}] No live document is available for {} {}. \
             This placeholder was generated locally ({}).",
            reason.as_str().to_uppercase(),
            item,
            period,
            detail
        );
        Self {
            sha256: payload_digest(&payload),
            item,
            period,
            payload,
            retrieved_at: Utc::now(),
            provenance: Provenance::Fallback {
                reason,
                detail: detail.to_string(),
            },
        }
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(self.item.clone(), self.period)
    }
}

fn payload_digest(payload: &str) -> String {
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

/// Raw document returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub payload: String,
}

/// Raw outcome classification reported by a provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has no document for this period.
    #[error("no document for this period")]
    NotFound,

    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// Credential missing or the plan lacks the entitlement.
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("request timed out")]
    Timeout,

    /// Network failure or server-side error worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
}

/// What the fetch client reports when it has no artifact to hand back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("transient failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FetchError::NotFound => "not_found",
            FetchError::RateLimited { .. } => "rate_limited",
            FetchError::Transient(_) => "transient",
        }
    }
}

/// A remote source of per-(item, period) documents.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Short name used in provenance and logs.
    fn name(&self) -> &str;

    /// Perform one remote call.
    async fn fetch_document(
        &self,
        item: &Item,
        period: Period,
    ) -> Result<RemoteDocument, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item::parse("AAPL").unwrap()
    }

    fn q(year: i32, quarter: u8) -> Period {
        Period::new(year, quarter).unwrap()
    }

    #[test]
    fn test_live_artifact_hashes_payload() {
        let a = Artifact::live(item(), q(2025, 1), "hello".to_string(), "remote");
        assert_eq!(
            a.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(!a.provenance.is_fallback());
    }

    #[test]
    fn test_fallback_artifact_is_labeled() {
        let a = Artifact::fallback(item(), q(2024, 4), FallbackReason::Timeout, "30s elapsed");
        assert!(a.payload.starts_with("[FALLBACK:TIMEOUT]"));
        assert!(a.payload.contains("AAPL 2024Q4"));
        assert!(a.provenance.is_fallback());
        assert_eq!(a.key(), ArtifactKey::new(item(), q(2024, 4)));
    }

    #[test]
    fn test_provenance_serialization() {
        let p = Provenance::Fallback {
            reason: FallbackReason::AccessDenied,
            detail: "demo".to_string(),
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "fallback");
        assert_eq!(json["reason"], "access_denied");
    }
}
