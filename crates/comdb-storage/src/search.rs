//! Search over an agent's memory entries with relevance scoring.
//!
//! The engine scores every entry of an agent against the query and returns
//! them ranked by descending score, ties broken by insertion order (earliest
//! first). Scoring is behind the [`Scorer`] trait so an embedding-distance
//! scorer can be plugged in without touching the engine; the default is
//! token overlap.
//!
//! Ranking is deterministic: identical store contents and query always
//! produce the same result list.

use crate::memory::MemoryStore;
use comdb_models::{Result, ScoredEntry};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Similarity between a query and one entry, in `[0.0, 1.0]`.
pub trait Scorer: Send + Sync {
    fn score(&self, query: &str, content: &str) -> f64;
}

/// Jaccard overlap of lowercased alphanumeric tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenOverlapScorer;

fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

impl Scorer for TokenOverlapScorer {
    fn score(&self, query: &str, content: &str) -> f64 {
        let query_tokens = tokenize(query);
        let content_tokens = tokenize(content);
        if query_tokens.is_empty() || content_tokens.is_empty() {
            return 0.0;
        }
        let shared = query_tokens.intersection(&content_tokens).count();
        let union = query_tokens.union(&content_tokens).count();
        shared as f64 / union as f64
    }
}

/// Ranked search over one agent's memory.
pub struct SearchEngine {
    store: Arc<MemoryStore>,
    scorer: Box<dyn Scorer>,
}

impl SearchEngine {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self::with_scorer(store, Box::new(TokenOverlapScorer))
    }

    pub fn with_scorer(store: Arc<MemoryStore>, scorer: Box<dyn Scorer>) -> Self {
        Self { store, scorer }
    }

    /// Score every entry of `agent_id` against `query` and rank them.
    /// Fails with `AgentNotFound` for an unknown agent.
    pub fn search(&self, agent_id: &str, query: &str) -> Result<Vec<ScoredEntry>> {
        let entries = self.store.get(agent_id)?;
        let mut scored: Vec<ScoredEntry> = entries
            .into_iter()
            .map(|entry| ScoredEntry {
                score: self.scorer.score(query, &entry.content),
                content: entry.content,
                sequence: entry.sequence,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        Ok(scored)
    }
}
