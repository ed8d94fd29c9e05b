//! Typed async client for a ComDB server.
//!
//! One method per endpoint, translating calls into HTTP requests and
//! responses back into typed values. Failures surface as [`ClientError`]
//! values rather than printed diagnostics, so callers can branch on them.
//!
//! ```rust,ignore
//! use comdb_client::ComDbClient;
//!
//! let client = ComDbClient::new("localhost", 9090);
//! client.put("czp", "ZhangPeiCheng").await?;
//! let value = client.get("czp").await?;
//!
//! client.create_memory_meta("a1", 10).await?;
//! client.memory_set("a1", "the first memory").await?;
//! let ranked = client.memory_search("a1", "first").await?;
//! ```

pub mod error;

pub use error::{ClientError, Result};

use comdb_models::{CompressionOutcome, KeyValue, MemoryMeta, ScoredEntry};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompressReply {
    success: bool,
    outcome: CompressionOutcome,
}

/// Handle to one ComDB server.
#[derive(Debug, Clone)]
pub struct ComDbClient {
    addr: String,
    http: reqwest::Client,
}

impl ComDbClient {
    /// Connect to the server at `http://{host}:{port}`.
    pub fn new(host: &str, port: u16) -> Self {
        Self::from_url(format!("http://{host}:{port}"))
    }

    /// Connect to a full base URL, e.g. `http://comdb.internal:9090`.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            addr: url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Check that the server is reachable and healthy.
    pub async fn health(&self) -> Result<()> {
        let response = self.http.get(format!("{}/health", self.addr)).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Retrieve the value stored under `key`.
    pub async fn get(&self, key: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/bitcask/get", self.addr))
            .query(&[("key", key)])
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.text().await?)
    }

    /// Store a key-value pair.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let body = HashMap::from([(key, value)]);
        let response = self
            .http
            .post(format!("{}/bitcask/put", self.addr))
            .json(&body)
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Delete `key`. Succeeds whether or not the key was live.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/bitcask/delete", self.addr))
            .query(&[("key", key)])
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// List all live keys.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/bitcask/listkeys", self.addr))
            .send()
            .await?;
        let text = Self::ensure_success(response).await?.text().await?;
        Ok(text.lines().map(str::to_string).collect())
    }

    /// Fetch the server's store statistics as text.
    pub async fn stat(&self) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/bitcask/stat", self.addr))
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.text().await?)
    }

    /// All `(key, value)` pairs whose key starts with `prefix`.
    pub async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        let response = self
            .http
            .get(format!("{}/bitcask/prefix", self.addr))
            .query(&[("prefix", prefix)])
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.json().await?)
    }

    /// All memory entries for `agent_id`, one per line.
    ///
    /// Large memory sets are better fetched in pages via
    /// [`memory_get_page`](Self::memory_get_page).
    pub async fn memory_get(&self, agent_id: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/memory/get", self.addr))
            .query(&[("agentId", agent_id)])
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.text().await?)
    }

    /// A page of memory entries for `agent_id`, one per line.
    pub async fn memory_get_page(
        &self,
        agent_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/memory/get", self.addr))
            .query(&[
                ("agentId", agent_id.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.text().await?)
    }

    /// Append one entry to the agent's memory.
    pub async fn memory_set(&self, agent_id: &str, value: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/memory/set", self.addr))
            .json(&serde_json::json!({
                "agentId": agent_id,
                "value": value,
            }))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Search the agent's memory, ranked by relevance to `search_item`.
    pub async fn memory_search(&self, agent_id: &str, search_item: &str) -> Result<Vec<ScoredEntry>> {
        let response = self
            .http
            .get(format!("{}/memory/search", self.addr))
            .query(&[("agentId", agent_id), ("searchItem", search_item)])
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.json().await?)
    }

    /// Create a memory space for `agent_id` with an entry-count budget of
    /// `total_size`.
    pub async fn create_memory_meta(&self, agent_id: &str, total_size: u64) -> Result<MemoryMeta> {
        let response = self
            .http
            .post(format!("{}/memory/create", self.addr))
            .json(&serde_json::json!({
                "agentId": agent_id,
                "totalSize": total_size,
            }))
            .send()
            .await?;
        Ok(Self::ensure_success(response).await?.json().await?)
    }

    /// Compress the agent's memory through the summarizer at `endpoint`.
    pub async fn compress_memory(
        &self,
        agent_id: &str,
        endpoint: &str,
    ) -> Result<CompressionOutcome> {
        let response = self
            .http
            .post(format!("{}/memory/compress", self.addr))
            .json(&serde_json::json!({
                "agentId": agent_id,
                "endpoint": endpoint,
            }))
            .send()
            .await?;
        let reply: CompressReply = Self::ensure_success(response).await?.json().await?;
        if !reply.success {
            return Err(ClientError::Api {
                status: 200,
                message: format!("memory compression failed for agent '{agent_id}'"),
            });
        }
        Ok(reply.outcome)
    }

    /// Register a summarizer `endpoint` as the agent's compression backend.
    pub async fn create_compressor(&self, agent_id: &str, endpoint: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/memory/create-compressor", self.addr))
            .json(&serde_json::json!({
                "agentId": agent_id,
                "endpoint": endpoint,
            }))
            .send()
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ComDbClient {
        ComDbClient::from_url(server.uri())
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        client_for(&server).await.health().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_returns_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bitcask/get"))
            .and(query_param("key", "czp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ZhangPeiCheng"))
            .mount(&server)
            .await;

        let value = client_for(&server).await.get("czp").await.unwrap();
        assert_eq!(value, "ZhangPeiCheng");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bitcask/get"))
            .respond_with(ResponseTemplate::new(404).set_body_string("key not found: czp"))
            .mount(&server)
            .await;

        let result = client_for(&server).await.get("czp").await;
        match result {
            Err(ClientError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert!(message.contains("key not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_put_sends_key_value_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bitcask/put"))
            .and(body_json(serde_json::json!({"czp": "ZhangPeiCheng"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .put("czp", "ZhangPeiCheng")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_keys_splits_lines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bitcask/listkeys"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a\nb\nc"))
            .mount(&server)
            .await;

        let keys = client_for(&server).await.list_keys().await.unwrap();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_list_keys_empty_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bitcask/listkeys"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let keys = client_for(&server).await.list_keys().await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_prefix_parses_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bitcask/prefix"))
            .and(query_param("prefix", "czp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"key": "czp1", "value": "v1"},
                {"key": "czp2", "value": "v2"},
            ])))
            .mount(&server)
            .await;

        let pairs = client_for(&server).await.get_by_prefix("czp").await.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key, "czp1");
        assert_eq!(pairs[1].value, "v2");
    }

    #[tokio::test]
    async fn test_memory_set_body_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/memory/set"))
            .and(body_json(serde_json::json!({
                "agentId": "a1",
                "value": "remember this",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .memory_set("a1", "remember this")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_memory_search_parses_ranked_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/memory/search"))
            .and(query_param("agentId", "a1"))
            .and(query_param("searchItem", "cloud"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"content": "cloud computing", "score": 0.5, "sequence": 1},
                {"content": "other topic", "score": 0.0, "sequence": 2},
            ])))
            .mount(&server)
            .await;

        let results = client_for(&server)
            .await
            .memory_search("a1", "cloud")
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "cloud computing");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_create_memory_meta_parses_meta() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/memory/create"))
            .and(body_json(serde_json::json!({
                "agentId": "a1",
                "totalSize": 10,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "agentId": "a1",
                "totalSize": 10,
                "createdAt": "2025-01-15T19:11:00Z",
            })))
            .mount(&server)
            .await;

        let meta = client_for(&server)
            .await
            .create_memory_meta("a1", 10)
            .await
            .unwrap();
        assert_eq!(meta.agent_id, "a1");
        assert_eq!(meta.total_size, 10);
    }

    #[tokio::test]
    async fn test_compress_memory_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/memory/compress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "outcome": {"entriesBefore": 10, "entriesAfter": 1},
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .await
            .compress_memory("a1", "http://summarizer:5000/generate")
            .await
            .unwrap();
        assert_eq!(outcome.entries_before, 10);
        assert_eq!(outcome.entries_after, 1);
    }

    #[tokio::test]
    async fn test_compress_memory_upstream_failure_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/memory/compress"))
            .respond_with(
                ResponseTemplate::new(502).set_body_string("upstream summarizer error"),
            )
            .mount(&server)
            .await;

        let result = client_for(&server)
            .await
            .compress_memory("a1", "http://summarizer:5000/generate")
            .await;
        assert!(matches!(result, Err(ClientError::Api { status: 502, .. })));
    }

    #[tokio::test]
    async fn test_transport_error_is_http_error() {
        // Nothing is listening on this port.
        let client = ComDbClient::from_url("http://127.0.0.1:1");
        let result = client.health().await;
        assert!(matches!(result, Err(ClientError::Http(_))));
    }
}
