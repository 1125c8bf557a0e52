//! MCP session management.
//!
//! Manages session lifecycle for MCP Streamable HTTP connections.
//! Sessions are identified by random v4 UUIDs and bound to the credential
//! that created them.

use super::adapter::SessionAdapter;
use super::engine::{EngineFactory, Notifier};
use crate::auth::Credential;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// An MCP session.
pub struct McpSession {
    /// Unique session identifier.
    pub id: String,
    credential: Credential,
    /// When the session was created.
    pub created_at: Instant,
    last_activity: parking_lot::Mutex<Instant>,
    adapter: SessionAdapter,
}

impl McpSession {
    /// The credential the session was created with.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn adapter(&self) -> &SessionAdapter {
        &self.adapter
    }

    /// Record activity, postponing idle eviction.
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the last request touched this session.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Get the session age in seconds.
    pub fn age_secs(&self) -> u64 {
        self.created_at.elapsed().as_secs()
    }

    /// Idle sessions have no open push stream and no recent requests.
    fn is_idle(&self, max_idle: Duration) -> bool {
        !self.adapter.has_stream() && self.idle_for() >= max_idle
    }
}

impl std::fmt::Debug for McpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpSession")
            .field("id", &self.id)
            .field("credential", &self.credential)
            .field("age_secs", &self.age_secs())
            .finish()
    }
}

/// Manager for MCP sessions.
///
/// The table is the only state shared between concurrent requests. Inserts
/// and removals happen under the write lock, so a lookup sees either a
/// complete session or none. Session teardown runs after the entry is gone
/// and outside the lock.
#[derive(Clone)]
pub struct McpSessionManager {
    sessions: Arc<RwLock<HashMap<String, Arc<McpSession>>>>,
    factory: Arc<dyn EngineFactory>,
}

impl McpSessionManager {
    /// Create a new session manager whose sessions run engines from `factory`.
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            factory,
        }
    }

    /// Create a new session bound to `credential`.
    pub async fn create_session(&self, credential: Credential) -> Arc<McpSession> {
        let notifier = Notifier::new();
        let engine = self.factory.create(credential.clone(), notifier.clone());
        let now = Instant::now();
        let session = Arc::new(McpSession {
            id: Uuid::new_v4().to_string(),
            credential,
            created_at: now,
            last_activity: parking_lot::Mutex::new(now),
            adapter: SessionAdapter::new(engine, notifier),
        });

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        info!("Created MCP session: {}", session.id);
        session
    }

    /// Get a session by ID, marking it active.
    pub async fn get_session(&self, id: &str) -> Option<Arc<McpSession>> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(id).cloned();
        if let Some(session) = &session {
            session.touch();
        }
        session
    }

    /// Check if a session exists.
    pub async fn session_exists(&self, id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(id)
    }

    /// Terminate a session. Unknown ids are a no-op returning `false`.
    pub async fn terminate(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.adapter.close().await;
                info!("Terminated MCP session: {}", id);
                true
            }
            None => {
                debug!("Terminate requested for unknown MCP session: {}", id);
                false
            }
        }
    }

    /// Get the number of active sessions.
    pub async fn session_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    /// Remove sessions that have been idle for at least `max_idle`.
    pub async fn cleanup_idle(&self, max_idle: Duration) -> usize {
        let expired: Vec<Arc<McpSession>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .values()
                .filter(|session| session.is_idle(max_idle))
                .map(|session| session.id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            session.adapter.close().await;
            info!(
                "Cleaning up idle MCP session: {} (idle: {}s)",
                session.id,
                session.idle_for().as_secs()
            );
        }
        expired.len()
    }

    /// Close every session. Used on shutdown so open push streams end.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<McpSession>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        for session in &drained {
            session.adapter.close().await;
        }
        if !drained.is_empty() {
            info!("Closed {} MCP session(s)", drained.len());
        }
        drained.len()
    }

    /// Periodically evict sessions idle for at least `max_idle`.
    pub fn spawn_idle_sweeper(&self, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = manager.cleanup_idle(max_idle).await;
                if removed > 0 {
                    debug!("Idle sweep removed {} MCP session(s)", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::validate_api_key;
    use crate::mcp::engine::{ResponseSink, RpcEngine, SinkClosed};
    use async_trait::async_trait;
    use futures::StreamExt;
    use serde_json::{json, Value};

    /// Answers every message with the credential it was created for.
    struct WhoAmI(Credential);

    #[async_trait]
    impl RpcEngine for WhoAmI {
        async fn handle(
            &mut self,
            _message: Value,
            sink: &mut ResponseSink,
        ) -> Result<(), SinkClosed> {
            sink.write(json!({"credential": self.0.as_str()})).await
        }
    }

    struct WhoAmIFactory;

    impl EngineFactory for WhoAmIFactory {
        fn create(&self, credential: Credential, _notifier: Notifier) -> Box<dyn RpcEngine> {
            Box::new(WhoAmI(credential))
        }
    }

    fn manager() -> McpSessionManager {
        McpSessionManager::new(Arc::new(WhoAmIFactory))
    }

    fn key(raw: &str) -> Credential {
        validate_api_key(Some(raw)).unwrap()
    }

    #[tokio::test]
    async fn test_created_session_is_bound_to_its_credential() {
        let manager = manager();
        let created = manager.create_session(key("sk-abc")).await;

        let found = manager.get_session(&created.id).await.unwrap();
        assert_eq!(found.credential().as_str(), "sk-abc");

        let reply = found.adapter().handle_unary(json!({})).await.unwrap();
        assert_eq!(reply.body, Some(json!({"credential": "sk-abc"})));
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let manager = manager();
        let session = manager.create_session(key("sk-abc")).await;

        assert!(manager.terminate(&session.id).await);
        assert!(!manager.terminate(&session.id).await);
        assert!(!manager.terminate("no-such-session").await);
        assert!(manager.get_session(&session.id).await.is_none());
        assert!(session.adapter().is_closed());
    }

    #[tokio::test]
    async fn test_terminate_ends_open_stream() {
        let manager = manager();
        let session = manager.create_session(key("sk-abc")).await;
        let mut stream = session.adapter().open_stream().unwrap();

        manager.terminate(&session.id).await;
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let manager = manager();
        let mut handles = Vec::new();
        for n in 0..32 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let session = manager.create_session(key(&format!("sk-{n}"))).await;
                (session.id.clone(), n)
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let (id, n) = handle.await.unwrap();
            let session = manager.get_session(&id).await.unwrap();
            assert_eq!(session.credential().as_str(), format!("sk-{n}"));
            assert!(ids.insert(id));
        }
        assert_eq!(manager.session_count().await, 32);
    }

    #[tokio::test]
    async fn test_cleanup_idle_spares_sessions_with_streams() {
        let manager = manager();
        let idle = manager.create_session(key("sk-idle")).await;
        let streaming = manager.create_session(key("sk-stream")).await;
        let _stream = streaming.adapter().open_stream().unwrap();

        let removed = manager.cleanup_idle(Duration::ZERO).await;
        assert_eq!(removed, 1);
        assert!(!manager.session_exists(&idle.id).await);
        assert!(manager.session_exists(&streaming.id).await);
        assert!(idle.adapter().is_closed());
    }

    #[tokio::test]
    async fn test_cleanup_idle_keeps_recent_sessions() {
        let manager = manager();
        manager.create_session(key("sk-abc")).await;
        assert_eq!(manager.cleanup_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_all() {
        let manager = manager();
        let a = manager.create_session(key("sk-a")).await;
        manager.create_session(key("sk-b")).await;

        assert_eq!(manager.close_all().await, 2);
        assert_eq!(manager.session_count().await, 0);
        assert!(a.adapter().is_closed());
    }
}
