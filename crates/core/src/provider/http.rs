//! HTTP document provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::debug;

use super::{DocumentProvider, ProviderError, RemoteDocument};
use crate::config::ProviderConfig;
use crate::item::Item;
use crate::period::Period;

/// Fetches documents from a remote HTTP API.
///
/// Documents are addressed as `{base_url}/v1/documents/{item}/{year}/{quarter}`
/// and authenticated with a bearer token.
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn document_url(&self, item: &Item, period: Period) -> String {
        format!(
            "{}/v1/documents/{}/{}/{}",
            self.base_url,
            urlencoding::encode(item.as_str()),
            period.year(),
            period.quarter()
        )
    }
}

/// Map an HTTP status to a provider classification.
///
/// Returns `None` for success statuses.
fn classify_status(status: StatusCode, retry_after_ms: Option<u64>) -> Option<ProviderError> {
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_FOUND {
        return Some(ProviderError::NotFound);
    }
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after_ms },
        StatusCode::UNAUTHORIZED | StatusCode::PAYMENT_REQUIRED | StatusCode::FORBIDDEN => {
            ProviderError::AccessDenied(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout,
        s => ProviderError::Transient(format!("HTTP {}", s.as_u16())),
    })
}

#[async_trait]
impl DocumentProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_document(
        &self,
        item: &Item,
        period: Period,
    ) -> Result<RemoteDocument, ProviderError> {
        let url = self.document_url(item, period);
        debug!(%item, %period, "Requesting document");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Transient(e.to_string())
                }
            })?;

        let retry_after_ms = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        if let Some(err) = classify_status(response.status(), retry_after_ms) {
            return Err(err);
        }

        let payload = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transient(format!("failed to read body: {}", e))
            }
        })?;

        if payload.trim().is_empty() {
            return Err(ProviderError::NotFound);
        }

        Ok(RemoteDocument { payload })
    }
}

/// `Retry-After` in delta-seconds form, as milliseconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}
