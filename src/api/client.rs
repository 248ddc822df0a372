//! HTTP transport for OData v2 services
//!
//! Wraps a pooled reqwest client around the two upstream endpoints: the
//! metadata document (paginated via a continuation header) and the per-entity
//! data endpoint. Authentication headers are supplied opaquely by the caller.

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

use super::constants::{
    entity_endpoint, metadata_endpoint, params, COUNT_KEY, ENVELOPE_KEY,
    METADATA_CONTINUATION_HEADER, RESULTS_KEY,
};
use super::metadata::{Catalog, CatalogOptions};
use super::query::encode_params;
use super::scheduler::{CompiledQuery, Page, PageFetcher};

/// OData v2 service client with connection pooling
pub struct ServiceClient {
    base_url: String,
    http_client: reqwest::Client,
    headers: HeaderMap,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("gateway-query/0.1")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            headers: HeaderMap::new(),
        }
    }

    /// Attach caller-supplied headers (authentication, csrf, ...) sent with
    /// every request
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Create a client around a preconfigured reqwest client
    pub fn with_custom_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
            headers: HeaderMap::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the raw metadata document, following the continuation header
    /// across pages. A failure on any page aborts the whole fetch.
    pub async fn fetch_metadata(&self) -> Result<Vec<String>> {
        let mut pages = Vec::new();
        let mut url = metadata_endpoint(&self.base_url);

        loop {
            debug!("Fetching metadata page: {}", url);
            let response = self
                .http_client
                .get(&url)
                .headers(self.headers.clone())
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
                anyhow::bail!("Metadata fetch failed ({}): {}", status, error_text);
            }

            let next = response
                .headers()
                .get(METADATA_CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            pages.push(response.text().await?);

            match next {
                Some(link) => url = link,
                None => break,
            }
        }

        info!("Fetched metadata in {} page(s)", pages.len());
        Ok(pages)
    }

    /// Fetch and parse the metadata document into a catalog. No partial
    /// catalog is produced when any page fails.
    pub async fn load_catalog(&self, options: &CatalogOptions) -> Result<Catalog> {
        let pages = self.fetch_metadata().await?;
        Catalog::from_pages(&pages, options)
    }

    /// Decode a v2 response envelope into rows and the reported total count
    fn decode_page(body: &Value) -> Page {
        let envelope = body.get(ENVELOPE_KEY).unwrap_or(body);

        let total = envelope.get(COUNT_KEY).and_then(|count| {
            count
                .as_str()
                .and_then(|s| s.parse().ok())
                .or_else(|| count.as_u64())
        });

        let rows = match envelope.get(RESULTS_KEY) {
            Some(Value::Array(results)) => results.clone(),
            // Single-result responses carry the object directly
            _ => vec![envelope.clone()],
        };

        Page { rows, total }
    }
}

#[async_trait]
impl PageFetcher for ServiceClient {
    async fn fetch_page(&self, query: &CompiledQuery, skip: u32, top: u32) -> Result<Page> {
        let mut query_params = query.params.clone();
        query_params.push((params::TOP.to_string(), top.to_string()));
        query_params.push((params::SKIP.to_string(), skip.to_string()));

        let url = format!(
            "{}?{}",
            entity_endpoint(&self.base_url, &query.entity),
            encode_params(&query_params)
        );
        debug!("Fetching page: {}", url);

        let response = self
            .http_client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Query against {} failed ({}): {}", query.entity, status, error_text);
        }

        let body: Value = response.json().await?;
        Ok(Self::decode_page(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_page_with_count() {
        let body = json!({
            "d": {
                "results": [{"a": 1}, {"a": 2}],
                "__count": "250"
            }
        });
        let page = ServiceClient::decode_page(&body);
        assert_eq!(page.len(), 2);
        assert_eq!(page.total, Some(250));
    }

    #[test]
    fn test_decode_page_numeric_count() {
        let body = json!({"d": {"results": [], "__count": 7}});
        let page = ServiceClient::decode_page(&body);
        assert!(page.is_empty());
        assert_eq!(page.total, Some(7));
    }

    #[test]
    fn test_decode_single_result_object() {
        let body = json!({"d": {"name": "Ann"}});
        let page = ServiceClient::decode_page(&body);
        assert_eq!(page.len(), 1);
        assert_eq!(page.rows[0], json!({"name": "Ann"}));
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ServiceClient::new("https://host/odata/");
        assert_eq!(client.base_url(), "https://host/odata");
    }
}
