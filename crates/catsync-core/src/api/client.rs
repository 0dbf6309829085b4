//! HTTP client for the storefront's category endpoints.
//!
//! Every listing request carries a fresh `_t` query parameter and explicit
//! no-cache headers so neither the browser-side proxy nor any intermediary
//! serves a stale category list.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{active_top_level, nodes_from_values, CategoryNode, CategoryTreeNode};

use super::{CategorySource, FetchError};

// ============================================================================
// Constants
// ============================================================================

/// Category listing path, relative to the API base URL
const CATEGORIES_PATH: &str = "/products/categories/";

/// Nested category tree path, relative to the API base URL
const CATEGORY_TREE_PATH: &str = "/products/categories/tree/";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the storefront backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    /// First wait after a 429; doubles on each further 429.
    rate_limit_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            rate_limit_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn no_cache_headers() -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, header::HeaderValue::from_static("0"));
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, FetchError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    /// GET `path` bypassing caches and return the raw body.
    async fn get_fresh(&self, path: &str) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut retries = 0;
        let mut backoff = self.rate_limit_backoff;

        loop {
            let timestamp = Utc::now().timestamp_millis();
            debug!(url = %url, timestamp, "GET");
            let response = self
                .client
                .get(&url)
                .query(&[("_t", timestamp)])
                .headers(Self::no_cache_headers())
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response.text().await?),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(FetchError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// Fetch the nested category tree used by the filter sidebar
    pub async fn fetch_category_tree(&self) -> Result<Vec<CategoryTreeNode>, FetchError> {
        let body = self.get_fresh(CATEGORY_TREE_PATH).await?;
        let rows = unwrap_listing(parse_json(&body)?)?;
        serde_json::from_value(Value::Array(rows))
            .map_err(|e| FetchError::MalformedResponse(format!("category tree: {}", e)))
    }
}

#[async_trait]
impl CategorySource for ApiClient {
    async fn fetch_categories(&self) -> Result<Vec<CategoryNode>, FetchError> {
        let body = self.get_fresh(CATEGORIES_PATH).await?;
        parse_category_listing(&body)
    }
}

fn parse_json(body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedResponse(format!("response is not JSON: {}", e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Accept either a bare array or a paginated `{ "results": [...] }` envelope.
fn unwrap_listing(value: Value) -> Result<Vec<Value>, FetchError> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(other) => Err(FetchError::MalformedResponse(format!(
                "results is not an array: {}",
                json_kind(&other)
            ))),
            None => Err(FetchError::MalformedResponse(
                "object response has no results field".to_string(),
            )),
        },
        other => Err(FetchError::MalformedResponse(format!(
            "unexpected response type: {}",
            json_kind(&other)
        ))),
    }
}

/// Parse a listing body into the visible, ordered category list.
pub fn parse_category_listing(body: &str) -> Result<Vec<CategoryNode>, FetchError> {
    let rows = unwrap_listing(parse_json(body)?)?;
    Ok(active_top_level(nodes_from_values(rows)))
}
