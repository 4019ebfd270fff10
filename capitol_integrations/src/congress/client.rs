//! HTTP client for api.congress.gov list endpoints.
//!
//! Implements the core's `ApiClient` by fetching one listing page per call
//! and classifying the result into the traversal engine's outcome tags. All
//! pacing decisions stay with the governor; this client never sleeps.

use capitol_core::config::ApiConfig;
use capitol_core::models::{DateWindow, Family};
use capitol_core::traversal::{ApiClient, FetchResult, Page};
use capitol_core::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::instrument;

use super::endpoints;

/// Environment variable holding the API key. Never read from config files.
pub const API_KEY_ENV: &str = "CONGRESS_API_KEY";

#[derive(Debug)]
pub struct CongressClient {
    base_url: String,
    api_key: String,
    default_client: reqwest::Client,
    /// Families with their own (connect, read) timeout pair.
    per_family: HashMap<Family, reqwest::Client>,
}

impl CongressClient {
    /// Build a client taking the API key from the process environment.
    pub fn from_env(api: &ApiConfig) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| Error::MissingApiKey)?;
        Self::new(api, key)
    }

    pub fn new(api: &ApiConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        let build = |connect: Duration, read: Duration| -> Result<reqwest::Client> {
            reqwest::Client::builder()
                .connect_timeout(connect)
                .timeout(read)
                .build()
                .map_err(|e| Error::backend("build http client", e))
        };

        let defaults = capitol_core::config::TimeoutConfig::default();
        let default_client = build(defaults.connect(), defaults.read())?;
        let mut per_family = HashMap::new();
        for (family, timeouts) in &api.timeout_config {
            per_family.insert(*family, build(timeouts.connect(), timeouts.read())?);
        }

        Ok(Self {
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_client,
            per_family,
        })
    }

    fn client_for(&self, family: Family) -> &reqwest::Client {
        self.per_family.get(&family).unwrap_or(&self.default_client)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("X-API-Key", value);
        }
        headers
    }
}

#[async_trait]
impl ApiClient for CongressClient {
    #[instrument(level = "debug", skip(self, window), fields(from = %window.from, to = %window.to))]
    async fn fetch_page(
        &self,
        family: Family,
        window: &DateWindow,
        offset: u32,
        limit: u32,
    ) -> FetchResult {
        let url = format!("{}/{}", self.base_url, endpoints::list_path(family));
        let from = format!("{}T00:00:00Z", window.from);
        let to = format!("{}T23:59:59Z", window.to);

        let response = self
            .client_for(family)
            .get(&url)
            .headers(self.headers())
            .query(&[
                ("format", "json"),
                ("fromDateTime", from.as_str()),
                ("toDateTime", to.as_str()),
                ("offset", offset.to_string().as_str()),
                ("limit", limit.to_string().as_str()),
            ])
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return FetchResult::Timeout,
            Err(e) => return FetchResult::Transient(e.to_string()),
        };

        let status = response.status();
        match status {
            s if s.is_success() => {
                let body: Value = match response.json().await {
                    Ok(v) => v,
                    Err(e) => {
                        return FetchResult::Permanent(format!("malformed response body: {e}"))
                    }
                };
                let Some(records) = endpoints::find_records(family, &body) else {
                    return FetchResult::Permanent("unexpected response shape".to_string());
                };
                let next_offset = next_offset(&body, offset, limit, records.len());
                FetchResult::Page(Page {
                    records: records.clone(),
                    next_offset,
                })
            }
            StatusCode::TOO_MANY_REQUESTS => FetchResult::RateLimited {
                retry_after: retry_after(response.headers().get(RETRY_AFTER)),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                FetchResult::AuthFailed("invalid or expired API key".to_string())
            }
            s if s.is_server_error() => {
                FetchResult::Transient(format!("upstream returned {s}"))
            }
            s => FetchResult::Permanent(format!("upstream returned {s}")),
        }
    }
}

/// Next page offset, derived from the pagination envelope.
///
/// A `pagination.next` link means more data regardless of page fill; without
/// it a short page marks the end of the window.
fn next_offset(body: &Value, offset: u32, limit: u32, received: usize) -> Option<u32> {
    let has_next = body
        .get("pagination")
        .and_then(|p| p.get("next"))
        .map(|n| !n.is_null())
        .unwrap_or(false);
    if has_next {
        return Some(offset + received.max(1) as u32);
    }
    if received < limit as usize {
        None
    } else {
        Some(offset + received as u32)
    }
}

fn retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let secs: u64 = header?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_empty_api_key() {
        let err = CongressClient::new(&ApiConfig::default(), "  ").unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
    }

    #[test]
    fn next_offset_follows_pagination_link() {
        let body = json!({ "pagination": { "count": 500, "next": "https://..." } });
        assert_eq!(next_offset(&body, 0, 250, 250), Some(250));
        assert_eq!(next_offset(&body, 250, 250, 250), Some(500));
    }

    #[test]
    fn short_page_without_next_ends_window() {
        let body = json!({ "pagination": { "count": 260 } });
        assert_eq!(next_offset(&body, 250, 250, 10), None);
    }

    #[test]
    fn full_page_without_pagination_block_continues() {
        let body = json!({ "bills": [] });
        assert_eq!(next_offset(&body, 0, 2, 2), Some(2));
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        let value = HeaderValue::from_static("2");
        assert_eq!(retry_after(Some(&value)), Some(Duration::from_secs(2)));
        let date = HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT");
        assert_eq!(retry_after(Some(&date)), None);
        assert_eq!(retry_after(None), None);
    }
}
