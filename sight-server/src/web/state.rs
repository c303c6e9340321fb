//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::CachedSightEngine;
use crate::store::MemoryStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Sight engine over the loaded feeds, with cached query results
    pub sights: Arc<CachedSightEngine<MemoryStore>>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(sights: CachedSightEngine<MemoryStore>) -> Self {
        Self {
            sights: Arc::new(sights),
        }
    }
}
