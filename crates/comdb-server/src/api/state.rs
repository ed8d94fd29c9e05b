use comdb_storage::{Compressor, SearchEngine, Storage};
use std::sync::Arc;

/// Application state shared across all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub search: Arc<SearchEngine>,
    pub compressor: Arc<Compressor>,
}

impl AppState {
    pub fn new(storage: Arc<Storage>) -> Self {
        let search = Arc::new(SearchEngine::new(storage.memory.clone()));
        let compressor = Arc::new(Compressor::new(storage.memory.clone()));
        Self {
            storage,
            search,
            compressor,
        }
    }
}
