//! Handlers for the `/memory/*` endpoints.
//!
//! `get` answers with the agent's entries as plain text, one per line, and
//! accepts optional `offset`/`limit` parameters so oversized memory sets can
//! be fetched incrementally. `search`, `create`, and `compress` answer with
//! JSON.

use crate::api::response::ApiError;
use crate::api::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use comdb_models::{CompressionOutcome, MemoryMeta, ScoredEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryGetQuery {
    pub agent_id: String,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySetRequest {
    pub agent_id: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub agent_id: String,
    pub search_item: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemoryRequest {
    pub agent_id: String,
    pub total_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressRequest {
    pub agent_id: String,
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressReply {
    pub success: bool,
    pub outcome: CompressionOutcome,
}

// GET /memory/get?agentId=
pub async fn get_memory(
    State(state): State<AppState>,
    Query(query): Query<MemoryGetQuery>,
) -> Result<String, ApiError> {
    let entries = match (query.offset, query.limit) {
        (None, None) => state.storage.memory.get(&query.agent_id)?,
        (offset, limit) => state.storage.memory.get_page(
            &query.agent_id,
            offset.unwrap_or(0),
            limit.unwrap_or(usize::MAX),
        )?,
    };
    Ok(entries
        .into_iter()
        .map(|e| e.content)
        .collect::<Vec<_>>()
        .join("\n"))
}

// POST /memory/set
pub async fn set_memory(
    State(state): State<AppState>,
    Json(request): Json<MemorySetRequest>,
) -> Result<(), ApiError> {
    state.storage.memory.set(&request.agent_id, &request.value)?;
    Ok(())
}

// GET /memory/search?agentId=&searchItem=
pub async fn search_memory(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ScoredEntry>>, ApiError> {
    Ok(Json(state.search.search(&query.agent_id, &query.search_item)?))
}

// POST /memory/create
pub async fn create_memory(
    State(state): State<AppState>,
    Json(request): Json<CreateMemoryRequest>,
) -> Result<Json<MemoryMeta>, ApiError> {
    let meta = state
        .storage
        .memory
        .create_meta(&request.agent_id, request.total_size)?;
    Ok(Json(meta))
}

// POST /memory/compress
pub async fn compress_memory(
    State(state): State<AppState>,
    Json(request): Json<CompressRequest>,
) -> Result<Json<CompressReply>, ApiError> {
    let outcome = state
        .compressor
        .compress(&request.agent_id, &request.endpoint)
        .await?;
    Ok(Json(CompressReply {
        success: true,
        outcome,
    }))
}

// POST /memory/create-compressor
pub async fn create_compressor(
    State(state): State<AppState>,
    Json(request): Json<CompressRequest>,
) -> Result<(), ApiError> {
    state
        .compressor
        .register(&request.agent_id, &request.endpoint)?;
    Ok(())
}
