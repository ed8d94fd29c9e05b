//! Handlers for the `/bitcask/*` endpoints.
//!
//! `get`, `listkeys`, and `stat` answer with plain text; `prefix` answers
//! with JSON. `put` takes the `{key: value, ...}` JSON object shape the
//! original client sends and stores every pair.

use crate::api::response::ApiError;
use crate::api::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use comdb_models::KeyValue;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct PrefixQuery {
    #[serde(default)]
    pub prefix: String,
}

// GET /bitcask/get?key=
pub async fn get_value(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<String, ApiError> {
    Ok(state.storage.bitcask.get(&query.key)?)
}

// POST /bitcask/put
pub async fn put_value(
    State(state): State<AppState>,
    Json(pairs): Json<HashMap<String, String>>,
) -> Result<(), ApiError> {
    for (key, value) in &pairs {
        state.storage.bitcask.put(key, value)?;
    }
    Ok(())
}

// DELETE /bitcask/delete?key=
//
// Deleting a key with no live record is a successful no-op.
pub async fn delete_value(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<(), ApiError> {
    state.storage.bitcask.delete(&query.key)?;
    Ok(())
}

// GET /bitcask/listkeys
pub async fn list_keys(State(state): State<AppState>) -> String {
    state.storage.bitcask.list_keys().join("\n")
}

// GET /bitcask/stat
pub async fn stat(State(state): State<AppState>) -> String {
    state.storage.bitcask.stats().to_string()
}

// GET /bitcask/prefix?prefix=
pub async fn get_by_prefix(
    State(state): State<AppState>,
    Query(query): Query<PrefixQuery>,
) -> Result<Json<Vec<KeyValue>>, ApiError> {
    let pairs = state.storage.bitcask.get_by_prefix(&query.prefix)?;
    Ok(Json(
        pairs
            .into_iter()
            .map(|(key, value)| KeyValue { key, value })
            .collect(),
    ))
}
