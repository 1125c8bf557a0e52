//! Application state management.

use crate::mcp::{EngineFactory, HealthEngineFactory, McpSessionManager};
use crate::storage::Storage;
use std::sync::Arc;

/// Default cap on `POST /api/data` bodies (200 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 200 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Storage backend
    storage: Arc<dyn Storage>,
    /// Live MCP sessions
    sessions: McpSessionManager,
    /// Largest accepted ingestion body
    max_body_bytes: usize,
}

impl AppState {
    /// Create state whose MCP sessions run the health data engine.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let factory = Arc::new(HealthEngineFactory::new(storage.clone()));
        Self::with_engine_factory(storage, factory)
    }

    /// Create state with a custom MCP engine.
    pub fn with_engine_factory(storage: Arc<dyn Storage>, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                storage,
                sessions: McpSessionManager::new(factory),
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            }),
        }
    }

    /// Override the ingestion body limit. Call before the state is shared.
    pub fn with_max_body_bytes(self, max_body_bytes: usize) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                storage: self.inner.storage.clone(),
                sessions: self.inner.sessions.clone(),
                max_body_bytes,
            }),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    pub fn sessions(&self) -> &McpSessionManager {
        &self.inner.sessions
    }

    pub fn max_body_bytes(&self) -> usize {
        self.inner.max_body_bytes
    }
}
