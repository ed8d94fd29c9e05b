pub mod bitcask;
pub mod memory;
pub mod response;
pub mod state;

pub use response::ApiError;
pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post},
};

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> axum::Json<Health> {
    axum::Json(Health {
        status: "comdb is working!".to_string(),
    })
}

/// Assemble the full ComDB route table over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // KV store
        .route("/bitcask/get", get(bitcask::get_value))
        .route("/bitcask/put", post(bitcask::put_value))
        .route("/bitcask/delete", delete(bitcask::delete_value))
        .route("/bitcask/listkeys", get(bitcask::list_keys))
        .route("/bitcask/stat", get(bitcask::stat))
        .route("/bitcask/prefix", get(bitcask::get_by_prefix))
        // Agent memory
        .route("/memory/get", get(memory::get_memory))
        .route("/memory/set", post(memory::set_memory))
        .route("/memory/search", get(memory::search_memory))
        .route("/memory/create", post(memory::create_memory))
        .route("/memory/compress", post(memory::compress_memory))
        .route("/memory/create-compressor", post(memory::create_compressor))
        .with_state(state)
}
