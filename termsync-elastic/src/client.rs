use async_trait::async_trait;
use http::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::time::Duration;
use termsync::{BulkSummary, IndexBackend, Refresh};

use crate::config::ElasticConfig;
use crate::error::ElasticError;
use crate::types::{BulkResponse, DeleteByQueryResponse};

const NDJSON: &str = "application/x-ndjson";

/// Long-lived handle to one Elasticsearch-compatible endpoint. Share it
/// behind an `Arc`; the underlying connection pool is reused.
pub struct ElasticClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ElasticClient {
    pub fn new(config: &ElasticConfig) -> Result<Self, ElasticError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ElasticError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ElasticError> {
        request.send().await.map_err(|e| ElasticError::Request {
            url: url.to_string(),
            source: e,
        })
    }

    /// 2xx and 3xx count as success; anything else carries its body back.
    async fn check(
        response: reqwest::Response,
        url: &str,
    ) -> Result<reqwest::Response, ElasticError> {
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::debug!("[ES] {} -> {}: {}", url, status, body);
        Err(ElasticError::Status {
            url: url.to_string(),
            status,
            body,
        })
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        url: &str,
    ) -> Result<T, ElasticError> {
        response.json().await.map_err(|e| ElasticError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn put_json(&self, url: String, body: &serde_json::Value) -> Result<(), ElasticError> {
        let response = self.send(self.http_client.put(&url).json(body), &url).await?;
        Self::check(response, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for ElasticClient {
    async fn index_exists(&self, index: &str) -> termsync::Result<bool> {
        let url = self.url(&urlencoding::encode(index));
        let response = self.send(self.http_client.head(&url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response, &url).await?;
        Ok(true)
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &serde_json::Value,
    ) -> termsync::Result<()> {
        let url = self.url(&urlencoding::encode(index));
        self.put_json(url, settings).await?;
        Ok(())
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: Option<&str>,
        mapping: &serde_json::Value,
    ) -> termsync::Result<()> {
        let path = match doc_type {
            Some(ty) => format!(
                "{}/_mapping/{}",
                urlencoding::encode(index),
                urlencoding::encode(ty)
            ),
            None => format!("{}/_mapping", urlencoding::encode(index)),
        };
        self.put_json(self.url(&path), mapping).await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> termsync::Result<bool> {
        let url = self.url(&urlencoding::encode(index));
        let response = self.send(self.http_client.delete(&url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response, &url).await?;
        Ok(true)
    }

    async fn bulk(&self, payload: String, refresh: Refresh) -> termsync::Result<BulkSummary> {
        let url = self.url("_bulk");
        let mut request = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, NDJSON)
            .body(payload);
        if let Some(value) = refresh.as_param() {
            request = request.query(&[("refresh", value)]);
        }

        let response = self.send(request, &url).await?;
        let response = Self::check(response, &url).await?;
        let parsed: BulkResponse = Self::decode(response, &url).await?;

        let summary = parsed.summary();
        if parsed.errors || summary.has_failures() {
            if let Some((action, item)) = parsed.failures().next() {
                tracing::warn!(
                    "[BULK] {} of {} item(s) failed; first: {} {} -> {} {}",
                    summary.failed,
                    parsed.items.len(),
                    action,
                    item.id.as_deref().unwrap_or("-"),
                    item.status,
                    item.error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default()
                );
            }
        } else {
            tracing::debug!("[BULK] {} item(s) applied in {}ms", summary.succeeded, parsed.took);
        }
        Ok(summary)
    }

    async fn delete_by_query(
        &self,
        index: &str,
        query: &serde_json::Value,
    ) -> termsync::Result<u64> {
        let url = self.url(&format!("{}/_delete_by_query", urlencoding::encode(index)));
        let response = self
            .send(self.http_client.post(&url).json(query), &url)
            .await?;
        let response = Self::check(response, &url).await?;
        let parsed: DeleteByQueryResponse = Self::decode(response, &url).await?;
        if !parsed.failures.is_empty() {
            tracing::warn!(
                "[ES] delete_by_query on {} reported {} failure(s)",
                index,
                parsed.failures.len()
            );
        }
        Ok(parsed.deleted)
    }

    async fn get_source(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
    ) -> termsync::Result<Option<serde_json::Value>> {
        let path = match doc_type {
            Some(ty) => format!(
                "{}/{}/{}/_source",
                urlencoding::encode(index),
                urlencoding::encode(ty),
                urlencoding::encode(doc_id)
            ),
            None => format!(
                "{}/_source/{}",
                urlencoding::encode(index),
                urlencoding::encode(doc_id)
            ),
        };
        let url = self.url(&path);
        let response = self.send(self.http_client.get(&url), &url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response, &url).await?;
        Ok(Some(Self::decode(response, &url).await?))
    }

    async fn search(
        &self,
        index: &str,
        query: &serde_json::Value,
    ) -> termsync::Result<serde_json::Value> {
        let url = self.url(&format!("{}/_search", urlencoding::encode(index)));
        let response = self
            .send(self.http_client.post(&url).json(query), &url)
            .await?;
        let response = Self::check(response, &url).await?;
        Ok(Self::decode(response, &url).await?)
    }
}
