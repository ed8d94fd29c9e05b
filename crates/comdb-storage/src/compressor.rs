//! Memory compression pipeline.
//!
//! Compression gathers an agent's current entries, sends them to an external
//! summarization endpoint, and on a successful, well-formed reply atomically
//! replaces the agent's entry set with the condensed result. On any failure
//! (transport, non-2xx, malformed body, reported failure flag, condensed set
//! over budget) the stored entries are left untouched.
//!
//! A job moves `Pending -> Sent -> {Succeeded, Failed}`. Nothing retries
//! automatically; the caller decides whether to try again.
//!
//! The upstream call runs without any store lock held; the swap itself
//! re-takes the write path only after the reply arrives.

use crate::memory::MemoryStore;
use async_trait::async_trait;
use comdb_models::{CompressionOutcome, JobState, Result, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// External summarization backend.
///
/// The production implementation is [`HttpSummarizer`]; tests substitute an
/// in-process fake.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Condense `entries` for `agent_id` via `endpoint`, returning the
    /// condensed entry set.
    async fn summarize(
        &self,
        agent_id: &str,
        endpoint: &str,
        entries: &[String],
    ) -> Result<Vec<String>>;
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    agent_id: &'a str,
    entries: &'a [String],
}

#[derive(Deserialize)]
struct SummarizeReply {
    success: bool,
    #[serde(default)]
    entries: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
}

/// Talks to an arbitrary HTTP summarization service: POSTs
/// `{agent_id, entries}` and expects `{success, entries}` back. A reply
/// carrying only a `summary` string is accepted as a one-entry set.
pub struct HttpSummarizer {
    client: reqwest::Client,
}

impl HttpSummarizer {
    pub fn new() -> Self {
        Self::with_timeout(UPSTREAM_TIMEOUT)
    }

    /// Bound the upstream round trip so a slow summarizer cannot stall an
    /// agent's memory indefinitely.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(
        &self,
        agent_id: &str,
        endpoint: &str,
        entries: &[String],
    ) -> Result<Vec<String>> {
        let response = self
            .client
            .post(endpoint)
            .json(&SummarizeRequest { agent_id, entries })
            .send()
            .await
            .map_err(|e| StoreError::Upstream(format!("request to {endpoint} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Upstream(format!(
                "{endpoint} returned status {status}"
            )));
        }

        let reply: SummarizeReply = response
            .json()
            .await
            .map_err(|e| StoreError::Upstream(format!("malformed reply from {endpoint}: {e}")))?;

        if !reply.success {
            return Err(StoreError::Upstream(format!(
                "{endpoint} reported failure"
            )));
        }
        if !reply.entries.is_empty() {
            return Ok(reply.entries);
        }
        if let Some(summary) = reply.summary {
            return Ok(vec![summary]);
        }
        Err(StoreError::Upstream(format!(
            "{endpoint} reported success without condensed entries"
        )))
    }
}

struct CompressionJob<'a> {
    agent_id: &'a str,
    state: JobState,
}

impl<'a> CompressionJob<'a> {
    fn new(agent_id: &'a str) -> Self {
        Self {
            agent_id,
            state: JobState::Pending,
        }
    }

    fn transition(&mut self, next: JobState) {
        tracing::debug!(
            agent_id = self.agent_id,
            from = ?self.state,
            to = ?next,
            "compression job transition"
        );
        self.state = next;
    }
}

/// Orchestrates compression jobs against a [`MemoryStore`].
pub struct Compressor {
    store: Arc<MemoryStore>,
    summarizer: Arc<dyn Summarizer>,
}

impl Compressor {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self::with_summarizer(store, Arc::new(HttpSummarizer::new()))
    }

    pub fn with_summarizer(store: Arc<MemoryStore>, summarizer: Arc<dyn Summarizer>) -> Self {
        Self { store, summarizer }
    }

    /// Register `endpoint` as the compression backend for `agent_id`.
    pub fn register(&self, agent_id: &str, endpoint: &str) -> Result<()> {
        self.store.register_compressor(agent_id, endpoint)
    }

    /// Run one compression job for `agent_id` against `endpoint`.
    ///
    /// Entries are snapshotted up front; no store lock is held across the
    /// upstream call. An empty memory set succeeds without contacting the
    /// endpoint.
    pub async fn compress(&self, agent_id: &str, endpoint: &str) -> Result<CompressionOutcome> {
        let meta = self.store.meta(agent_id)?;
        let entries = self.store.get(agent_id)?;
        if entries.is_empty() {
            return Ok(CompressionOutcome {
                entries_before: 0,
                entries_after: 0,
            });
        }
        let contents: Vec<String> = entries.into_iter().map(|e| e.content).collect();

        let mut job = CompressionJob::new(agent_id);
        job.transition(JobState::Sent);
        match self.summarizer.summarize(agent_id, endpoint, &contents).await {
            Ok(condensed) => {
                if condensed.len() as u64 > meta.total_size {
                    job.transition(JobState::Failed);
                    return Err(StoreError::Upstream(format!(
                        "condensed set has {} entries, over the budget of {}",
                        condensed.len(),
                        meta.total_size
                    )));
                }
                let outcome = self.store.replace_all(agent_id, condensed)?;
                job.transition(JobState::Succeeded);
                Ok(outcome)
            }
            Err(e) => {
                job.transition(JobState::Failed);
                tracing::warn!(agent_id, endpoint, error = %e, "compression failed");
                Err(e)
            }
        }
    }
}
